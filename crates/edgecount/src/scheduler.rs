use alloc::vec::Vec;

use log::{error, warn};

use crate::channel::{ChannelId, Counters};
use crate::error::{Error, Result};
use crate::events::{EdgeEvent, EdgeObserver, NoopObserver};
use crate::http::{Request, Response};
use crate::monitor::Monitor;
use crate::routes::{NoIndicator, Router, StatusIndicator};
use crate::websocket::{ConnectionId, Frame, handle_frame};

// Default pause between two iterations.
const DEFAULT_PAUSE_MS: u32 = 2;

/// The network primitives consumed by the [`CooperativeScheduler`].
///
/// All methods are non-blocking: a poll returns `None` when nothing is
/// pending and a send enqueues its data.
///
/// A facade reports an unreachable network stack with
/// [`Error::NetworkUnavailable`], which stops the scheduler. Any other error
/// only concerns the request or connection at hand.
pub trait NetworkFacade {
    /// Returns the next pending `HTTP` request.
    ///
    /// # Errors
    ///
    /// [`Error::RequestHandling`] for a malformed request, which the
    /// scheduler answers with a `400` response.
    fn poll_http(&mut self) -> Result<Option<Request>>;

    /// Sends the response to the last polled `HTTP` request.
    ///
    /// # Errors
    ///
    /// The requesting connection is gone or the network is unavailable.
    fn send_http_response(&mut self, response: Response) -> Result<()>;

    /// Returns the next pending `WebSocket` frame, across all connections.
    ///
    /// # Errors
    ///
    /// The network is unavailable.
    fn poll_ws_frame(&mut self) -> Result<Option<Frame>>;

    /// Sends a text frame to a connection.
    ///
    /// # Errors
    ///
    /// The connection is closed or the network is unavailable.
    fn send_ws_text(&mut self, connection: ConnectionId, text: &str) -> Result<()>;

    /// Sends a text frame to every open connection.
    ///
    /// # Errors
    ///
    /// The network is unavailable.
    fn broadcast_ws_text(&mut self, text: &str) -> Result<()>;
}

/// The bounded pause at the end of each scheduler iteration, which lets the
/// network stack and other background tasks run.
pub trait Pause {
    /// Pauses for the given number of milliseconds.
    fn pause(&mut self, duration_ms: u32) -> impl Future<Output = ()>;
}

/// The work done by a single scheduler iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Iteration {
    /// Whether an `HTTP` request has been served.
    pub http_request: bool,
    /// Number of dispatched `WebSocket` frames.
    pub frames: usize,
    /// Number of reported edge events.
    pub edge_events: usize,
}

/// The main loop.
///
/// Each iteration:
///
/// 1. Serves at most one pending `HTTP` request
/// 2. Dispatches every pending `WebSocket` frame
/// 3. Drains the dirty channels and reports each drained edge to the logs,
///    to every `WebSocket` client as `JSON` text and to the observer
/// 4. Pauses
///
/// The scheduler keeps no state across iterations: the counters live in the
/// channels and the connections in the facade.
pub struct CooperativeScheduler<'a, F, I = NoIndicator, O = NoopObserver>
where
    F: NetworkFacade,
    I: StatusIndicator,
    O: EdgeObserver,
{
    facade: F,
    router: Router,
    monitor: Monitor<'a>,
    indicator: I,
    observer: O,
    pause_ms: u32,
}

impl<'a, F> CooperativeScheduler<'a, F>
where
    F: NetworkFacade,
{
    /// Creates a [`CooperativeScheduler`].
    #[must_use]
    pub fn new(facade: F, router: Router, monitor: Monitor<'a>) -> Self {
        Self {
            facade,
            router,
            monitor,
            indicator: NoIndicator,
            observer: NoopObserver,
            pause_ms: DEFAULT_PAUSE_MS,
        }
    }
}

impl<'a, F, I, O> CooperativeScheduler<'a, F, I, O>
where
    F: NetworkFacade,
    I: StatusIndicator,
    O: EdgeObserver,
{
    /// Sets the status indicator pulsed by the routes.
    #[must_use]
    pub fn indicator<J: StatusIndicator>(self, indicator: J) -> CooperativeScheduler<'a, F, J, O> {
        CooperativeScheduler {
            facade: self.facade,
            router: self.router,
            monitor: self.monitor,
            indicator,
            observer: self.observer,
            pause_ms: self.pause_ms,
        }
    }

    /// Sets an additional observer of the drained edge events.
    #[must_use]
    pub fn observer<P: EdgeObserver>(self, observer: P) -> CooperativeScheduler<'a, F, I, P> {
        CooperativeScheduler {
            facade: self.facade,
            router: self.router,
            monitor: self.monitor,
            indicator: self.indicator,
            observer,
            pause_ms: self.pause_ms,
        }
    }

    /// Sets the pause between two iterations, in milliseconds.
    #[must_use]
    pub const fn pause(mut self, pause_ms: u32) -> Self {
        self.pause_ms = pause_ms;
        self
    }

    /// Returns the counters of a channel without draining it.
    #[must_use]
    pub fn query_counters(&self, id: ChannelId) -> Option<Counters> {
        self.monitor.query_counters(id)
    }

    /// Returns the network facade.
    #[must_use]
    pub const fn facade(&self) -> &F {
        &self.facade
    }

    /// Returns the network facade mutably.
    pub const fn facade_mut(&mut self) -> &mut F {
        &mut self.facade
    }

    /// Runs the loop until the network becomes unavailable.
    ///
    /// # Errors
    ///
    /// Returns the [`Error::NetworkUnavailable`] which stopped the loop. The
    /// caller is expected to restart the device.
    pub async fn run<P: Pause>(&mut self, pause: &mut P) -> Result<()> {
        loop {
            if let Err(e) = self.iterate() {
                error!("Stopping the main loop: {e}");
                return Err(e);
            }
            pause.pause(self.pause_ms).await;
        }
    }

    /// Runs a single iteration, without the final pause.
    ///
    /// # Errors
    ///
    /// The network is unavailable.
    pub fn iterate(&mut self) -> Result<Iteration> {
        Ok(Iteration {
            http_request: self.serve_http()?,
            frames: self.dispatch_frames()?,
            edge_events: self.report_edges()?,
        })
    }

    fn serve_http(&mut self) -> Result<bool> {
        let response = match self.facade.poll_http() {
            Ok(Some(request)) => self.router.dispatch(&request, &mut self.indicator),
            Ok(None) => return Ok(false),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Malformed request: {e}");
                Response::bad_request(alloc::format!("{e}\n"))
            }
        };

        if let Err(e) = self.facade.send_http_response(response) {
            Self::tolerate(e, "Failed to send the response")?;
        }

        Ok(true)
    }

    fn dispatch_frames(&mut self) -> Result<usize> {
        let mut frames = 0;

        while let Some(frame) = self.facade.poll_ws_frame()? {
            frames += 1;

            let Some(reply) = handle_frame(&frame) else {
                continue;
            };

            if let Err(e) = self.facade.send_ws_text(frame.connection, reply) {
                Self::tolerate(e, "Failed to reply")?;
            }
        }

        Ok(frames)
    }

    fn report_edges(&mut self) -> Result<usize> {
        let mut events = Vec::new();
        let notified = self.monitor.drain(&mut |event: &EdgeEvent| events.push(*event));

        for event in &events {
            self.observer.on_edge_event(event);

            match serde_json::to_string(event) {
                Ok(text) => {
                    if let Err(e) = self.facade.broadcast_ws_text(&text) {
                        Self::tolerate(e, "Failed to broadcast an edge event")?;
                    }
                }
                Err(e) => error!("Failed to serialize `{event}`: {e}"),
            }
        }

        Ok(notified)
    }

    // Fatal errors are propagated, any other error is only logged.
    fn tolerate(e: Error, description: &str) -> Result<()> {
        if e.is_fatal() {
            return Err(e);
        }
        warn!("{description}: {e}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::VecDeque;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::channel::{ChannelId, Counters, SignalChannel};
    use crate::error::{Error, Result};
    use crate::events::EdgeEvent;
    use crate::http::{Method, Request, Response};
    use crate::monitor::Monitor;
    use crate::routes::{Router, StatusIndicator};
    use crate::websocket::{ConnectionId, Frame};

    use super::{CooperativeScheduler, Iteration, NetworkFacade, Pause};

    #[derive(Default)]
    struct FakeFacade {
        requests: VecDeque<Result<Option<Request>>>,
        responses: Vec<Response>,
        frames: VecDeque<Frame>,
        sent: Vec<(ConnectionId, String)>,
        broadcasts: Vec<String>,
        closed: Vec<ConnectionId>,
        link_down: bool,
    }

    impl NetworkFacade for FakeFacade {
        fn poll_http(&mut self) -> Result<Option<Request>> {
            if self.link_down {
                return Err(Error::network("link down"));
            }
            self.requests.pop_front().unwrap_or(Ok(None))
        }

        fn send_http_response(&mut self, response: Response) -> Result<()> {
            self.responses.push(response);
            Ok(())
        }

        fn poll_ws_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front())
        }

        fn send_ws_text(&mut self, connection: ConnectionId, text: &str) -> Result<()> {
            if self.closed.contains(&connection) {
                return Err(Error::request("connection closed"));
            }
            self.sent.push((connection, text.to_string()));
            Ok(())
        }

        fn broadcast_ws_text(&mut self, text: &str) -> Result<()> {
            self.broadcasts.push(text.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Led(Vec<bool>);

    impl StatusIndicator for Led {
        fn set(&mut self, on: bool) {
            self.0.push(on);
        }
    }

    // Counts the pauses and records an edge during each of them.
    struct CountingPause<'a> {
        pauses: u32,
        link_down_after: u32,
        channel: &'a SignalChannel,
    }

    impl Pause for CountingPause<'_> {
        async fn pause(&mut self, duration_ms: u32) {
            assert_eq!(duration_ms, 5);
            self.pauses += 1;
            // An edge fires while the loop is paused.
            let _ = self.channel.record_edge(self.pauses * 1000);
        }
    }

    #[test]
    fn serves_at_most_one_request_per_iteration() {
        let mut facade = FakeFacade::default();
        facade
            .requests
            .push_back(Ok(Some(Request::new(Method::Get, "/"))));
        facade
            .requests
            .push_back(Ok(Some(Request::new(Method::Get, "/inline"))));

        let mut scheduler =
            CooperativeScheduler::new(facade, Router::new(), Monitor::new()).indicator(Led::default());

        let iteration = scheduler.iterate().unwrap();
        assert!(iteration.http_request);
        assert_eq!(scheduler.facade().responses.len(), 1);
        assert_eq!(scheduler.facade().responses[0].body_text(), "hello from esp32!");

        assert!(scheduler.iterate().unwrap().http_request);
        assert!(!scheduler.iterate().unwrap().http_request);
        assert_eq!(scheduler.facade().responses.len(), 2);
    }

    #[test]
    fn malformed_request_is_answered_and_loop_continues() {
        let mut facade = FakeFacade::default();
        facade
            .requests
            .push_back(Err(Error::request("header too large")));
        facade
            .requests
            .push_back(Ok(Some(Request::new(Method::Get, "/nothing"))));

        let mut scheduler = CooperativeScheduler::new(facade, Router::new(), Monitor::new());

        assert!(scheduler.iterate().unwrap().http_request);
        assert!(scheduler.iterate().unwrap().http_request);

        let responses = &scheduler.facade().responses;
        assert_eq!(responses[0].status(), 400);
        assert_eq!(
            responses[0].body_text(),
            "Request handling error: header too large\n"
        );
        assert_eq!(responses[1].status(), 404);
    }

    #[test]
    fn ten_connections_get_one_acknowledgement_each_in_order() {
        let mut facade = FakeFacade::default();
        for id in 0..10u8 {
            facade
                .frames
                .push_back(Frame::text(ConnectionId(id), alloc::format!("message {id}")));
        }

        let mut scheduler = CooperativeScheduler::new(facade, Router::new(), Monitor::new());

        let iteration = scheduler.iterate().unwrap();
        assert_eq!(iteration.frames, 10);

        let expected = (0..10u8)
            .map(|id| (ConnectionId(id), "received a message".to_string()))
            .collect::<Vec<_>>();
        assert_eq!(scheduler.facade().sent, expected);
    }

    #[test]
    fn frame_kinds_and_closed_connections() {
        let mut facade = FakeFacade::default();
        facade
            .frames
            .push_back(Frame::connected(ConnectionId(1), "/", None));
        facade
            .frames
            .push_back(Frame::binary(ConnectionId(1), vec![0xca, 0xfe]));
        facade.frames.push_back(Frame::text(ConnectionId(2), "late"));
        facade.frames.push_back(Frame::disconnected(ConnectionId(1)));
        facade.closed.push(ConnectionId(2));

        let mut scheduler = CooperativeScheduler::new(facade, Router::new(), Monitor::new());

        assert_eq!(scheduler.iterate().unwrap().frames, 4);
        assert_eq!(
            scheduler.facade().sent,
            [(ConnectionId(1), "Connected".to_string())]
        );
    }

    #[test]
    fn drained_edges_are_broadcast_and_observed() {
        let channel = SignalChannel::new(ChannelId(23), 100);
        let mut observed = Vec::new();

        {
            let mut scheduler = CooperativeScheduler::new(
                FakeFacade::default(),
                Router::new(),
                Monitor::new().channel(&channel),
            )
            .observer(|event: &EdgeEvent| observed.push(*event));

            let _ = channel.record_edge(0);
            let _ = channel.record_edge(50);
            let _ = channel.record_edge(150);

            let iteration = scheduler.iterate().unwrap();
            assert_eq!(
                iteration,
                Iteration {
                    http_request: false,
                    frames: 0,
                    edge_events: 2,
                }
            );
            assert_eq!(
                scheduler.facade().broadcasts,
                [
                    r#"{"channel":23,"direction":"rising","count":1}"#,
                    r#"{"channel":23,"direction":"falling","count":1}"#,
                ]
            );
            assert_eq!(
                scheduler.query_counters(ChannelId(23)),
                Some(Counters {
                    rising: 1,
                    falling: 1
                })
            );

            // Nothing new: no event, same counters.
            assert_eq!(scheduler.iterate().unwrap().edge_events, 0);
            assert_eq!(scheduler.facade().broadcasts.len(), 2);
        }

        assert_eq!(observed.len(), 2);
        assert!(!channel.is_dirty());
    }

    #[tokio::test]
    async fn network_loss_stops_the_loop() {
        let channel = SignalChannel::new(ChannelId(2), 100);
        let mut pause = CountingPause {
            pauses: 0,
            link_down_after: 3,
            channel: &channel,
        };

        let mut scheduler = CooperativeScheduler::new(
            FakeFacade::default(),
            Router::new(),
            Monitor::new().channel(&channel),
        )
        .pause(5);

        // Drive the loop manually to bring the link down at the right time.
        while pause.pauses < pause.link_down_after {
            let _ = scheduler.iterate().unwrap();
            pause.pause(5).await;
        }
        scheduler.facade_mut().link_down = true;

        let result = scheduler.run(&mut pause).await;
        assert_eq!(result, Err(Error::network("link down")));

        // The edge recorded during the last pause is never drained.
        assert_eq!(scheduler.facade().broadcasts.len(), 2);
        assert_eq!(pause.pauses, 3);
    }
}
