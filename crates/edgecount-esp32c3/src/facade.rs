use alloc::format;
use alloc::string::ToString;

use edgecount::error::{Error as LoopError, Result as LoopResult};
use edgecount::http::{Request, Response};
use edgecount::scheduler::{NetworkFacade, Pause};
use edgecount::websocket::{ConnectionId, Frame, FrameType};

use embassy_net::Stack;
use embassy_time::{Duration, Instant, Timer};

use log::warn;

use crate::server::{REQUESTS, RESPONSES};
use crate::ws::{INBOUND, MAX_CONNECTIONS, OUTBOXES, bit};

// How long the link may stay down, while the association is retried,
// before the network is considered unavailable.
const LINK_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// The [`NetworkFacade`] of the `HTTP` and `WebSocket` servers.
///
/// The servers run in their own tasks and exchange requests, responses and
/// frames with the facade through queues, so the facade never blocks.
pub struct Esp32Facade {
    stack: Stack<'static>,
    open: u8,
    pending_request: bool,
    link_down_since: Option<Instant>,
}

impl Esp32Facade {
    /// Creates an [`Esp32Facade`] over a network stack.
    #[must_use]
    pub const fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            open: 0,
            pending_request: false,
            link_down_since: None,
        }
    }

    fn check_link(&mut self) -> LoopResult<()> {
        if self.stack.is_link_up() {
            self.link_down_since = None;
            return Ok(());
        }

        let since = *self.link_down_since.get_or_insert_with(Instant::now);
        if since.elapsed() > LINK_GRACE_PERIOD {
            return Err(LoopError::network(format!(
                "Link down for more than {} seconds",
                LINK_GRACE_PERIOD.as_secs()
            )));
        }

        Ok(())
    }

    fn open_connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        (0..MAX_CONNECTIONS)
            .filter_map(|index| u8::try_from(index).ok())
            .map(ConnectionId)
            .filter(|id| self.open & bit(*id) != 0)
    }
}

impl NetworkFacade for Esp32Facade {
    fn poll_http(&mut self) -> LoopResult<Option<Request>> {
        self.check_link()?;

        match REQUESTS.try_receive() {
            Ok(request) => {
                self.pending_request = true;
                request.map(Some)
            }
            Err(_) => Ok(None),
        }
    }

    fn send_http_response(&mut self, response: Response) -> LoopResult<()> {
        if !core::mem::take(&mut self.pending_request) {
            return Err(LoopError::request("No pending request"));
        }
        RESPONSES.signal(response);
        Ok(())
    }

    fn poll_ws_frame(&mut self) -> LoopResult<Option<Frame>> {
        let Ok(frame) = INBOUND.try_receive() else {
            return Ok(None);
        };

        match frame.kind {
            FrameType::Connected => self.open |= bit(frame.connection),
            FrameType::Disconnected => self.open &= !bit(frame.connection),
            FrameType::Text | FrameType::Binary => {}
        }

        Ok(Some(frame))
    }

    fn send_ws_text(&mut self, connection: ConnectionId, text: &str) -> LoopResult<()> {
        if self.open & bit(connection) == 0 {
            return Err(LoopError::request(format!(
                "Connection {connection} is closed"
            )));
        }

        OUTBOXES[usize::from(connection.0)]
            .try_send(text.to_string())
            .map_err(|_| LoopError::request(format!("Connection {connection} is congested")))
    }

    fn broadcast_ws_text(&mut self, text: &str) -> LoopResult<()> {
        for id in self.open_connections() {
            if OUTBOXES[usize::from(id.0)]
                .try_send(text.to_string())
                .is_err()
            {
                warn!("[{id}] Congested, dropping `{text}`");
            }
        }
        Ok(())
    }
}

/// A [`Pause`] yielding to the `embassy` executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyPause;

impl Pause for EmbassyPause {
    async fn pause(&mut self, duration_ms: u32) {
        Timer::after_millis(u64::from(duration_ms)).await;
    }
}
