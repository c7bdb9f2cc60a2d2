use core::cell::Cell;
use core::fmt::{Debug, Display};
use core::net::SocketAddr;

use alloc::string::String;

use edgecount::websocket::{ConnectionId, Frame};

use edge_http::io::server::{Connection, Handler, Server as EdgeServer};
use edge_http::ws::MAX_BASE64_KEY_RESPONSE_LEN;
use edge_nal::TcpBind;
use edge_nal_embassy::{Tcp, TcpBuffers};
use edge_ws::{FrameHeader, FrameType};

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use embedded_io_async::{ErrorType, Read, Write};

use log::{error, info, warn};

use crate::error::Result;
use crate::net::wait_for_ip;

// Default port.
const DEFAULT_SERVER_PORT: u16 = 81;

/// The maximum number of simultaneous `WebSocket` connections.
pub const MAX_CONNECTIONS: usize = 2;

// Socket buffer size.
const TX_SIZE: usize = 1024;
// Server buffer size.
const RX_SIZE: usize = 1024;
// Maximum number of allowed headers in a handshake.
const MAXIMUM_HEADERS_COUNT: usize = 16;
// Largest received payload.
const MAXIMUM_PAYLOAD_SIZE: usize = 512;
// Frames waiting for the loop.
const INBOUND_DEPTH: usize = 8;
// Texts waiting to be sent to a connection.
const OUTBOX_DEPTH: usize = 4;

// Connection identifiers are the bits of a byte.
const _: () = assert!(MAX_CONNECTIONS <= 8);

// Frames received from every connection, in arrival order.
pub(crate) static INBOUND: Channel<CriticalSectionRawMutex, Frame, INBOUND_DEPTH> = Channel::new();
// Texts to send, one queue per connection identifier.
pub(crate) static OUTBOXES: [Channel<CriticalSectionRawMutex, String, OUTBOX_DEPTH>;
    MAX_CONNECTIONS] = [const { Channel::new() }; MAX_CONNECTIONS];
// Connection identifiers in use.
static SLOTS: CriticalSectionMutex<Cell<u8>> = CriticalSectionMutex::new(Cell::new(0));

pub(crate) fn bit(id: ConnectionId) -> u8 {
    1u8.checked_shl(u32::from(id.0)).unwrap_or(0)
}

fn acquire() -> Option<ConnectionId> {
    SLOTS.lock(|slots| {
        let used = slots.get();
        let id = (0..MAX_CONNECTIONS)
            .filter_map(|index| u8::try_from(index).ok())
            .map(ConnectionId)
            .find(|id| used & bit(*id) == 0)?;
        slots.set(used | bit(id));
        Some(id)
    })
}

fn release(id: ConnectionId) {
    SLOTS.lock(|slots| slots.set(slots.get() & !bit(id)));
}

/// The `WebSocket` server.
///
/// Received frames are queued for the main loop, while the texts queued by
/// the loop are sent between two received frames.
pub struct WsServer {
    port: u16,
}

impl Default for WsServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WsServer {
    /// Creates a [`WsServer`] listening on port `81`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
        }
    }

    /// Sets the port number for the server to listen on.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Runs the [`WsServer`] in its own task.
    ///
    /// # Errors
    ///
    /// Failure to spawn the server task.
    pub fn spawn(self, stack: Stack<'static>, spawner: Spawner) -> Result<()> {
        spawner
            .spawn(run_ws_server(stack, self.port))
            .map_err(core::convert::Into::into)
    }
}

#[embassy_executor::task]
async fn run_ws_server(stack: Stack<'static>, port: u16) {
    if let Err(e) = serve(stack, port).await {
        error!("WebSocket server stopped: {e}");
    }
}

async fn serve(stack: Stack<'static>, port: u16) -> Result<()> {
    let buffers = TcpBuffers::<MAX_CONNECTIONS, TX_SIZE, RX_SIZE>::new();
    let tcp = Tcp::new(stack, &buffers);

    let address = wait_for_ip(stack).await;
    let acceptor = tcp.bind(SocketAddr::new(address.into(), port)).await?;

    info!("Starting the WebSocket server on address `{address}` and port `{port}`");

    let mut server = EdgeServer::<MAX_CONNECTIONS, RX_SIZE, MAXIMUM_HEADERS_COUNT>::new();
    server.run(None, acceptor, WsHandler).await?;

    Ok(())
}

#[derive(Debug)]
enum WsError<E> {
    Http(edge_http::io::Error<E>),
    Ws(edge_ws::Error<E>),
}

impl<E: Debug> Display for WsError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "HTTP error: {e:?}"),
            Self::Ws(e) => write!(f, "WebSocket error: {e:?}"),
        }
    }
}

impl<E> From<edge_http::io::Error<E>> for WsError<E> {
    fn from(e: edge_http::io::Error<E>) -> Self {
        Self::Http(e)
    }
}

struct WsHandler;

impl Handler for WsHandler {
    type Error<E>
        = WsError<E>
    where
        E: Debug;

    async fn handle<T, const N: usize>(
        &self,
        _task_id: impl Display + Copy,
        conn: &mut Connection<'_, T, N>,
    ) -> core::result::Result<(), Self::Error<T::Error>>
    where
        T: Read + Write,
    {
        let url = String::from(conn.headers()?.path);

        if !conn.is_ws_upgrade_request()? {
            conn.initiate_response(
                426,
                Some("Upgrade Required"),
                &[("Content-Type", "text/plain")],
            )
            .await?;
            conn.write_all(b"WebSocket connections only\n").await?;
            return Ok(());
        }

        let Some(id) = acquire() else {
            warn!("Refusing a WebSocket connection: too many connections");
            conn.initiate_response(503, Some("Service Unavailable"), &[])
                .await?;
            return Ok(());
        };

        let mut buf = [0_u8; MAX_BASE64_KEY_RESPONSE_LEN];
        let result: core::result::Result<(), WsError<T::Error>> = async {
            conn.initiate_ws_upgrade_response(&mut buf).await?;
            conn.complete().await?;
            serve_socket(conn.unbind()?, id, &url).await
        }
        .await;

        if let Err(e) = &result {
            warn!("[{id}] {e}");
        }

        release(id);
        result
    }
}

async fn serve_socket<T>(
    socket: &mut T,
    id: ConnectionId,
    url: &str,
) -> core::result::Result<(), WsError<T::Error>>
where
    T: Read + Write,
{
    let outbox = &OUTBOXES[usize::from(id.0)];
    // Texts left by a previous connection with the same identifier.
    outbox.clear();

    INBOUND.send(Frame::connected(id, url, None)).await;
    let result = exchange(socket, id, outbox).await;
    INBOUND.send(Frame::disconnected(id)).await;

    result
}

// A reader yielding already received bytes before reading the socket.
struct Prefixed<'a, T> {
    prefix: &'a [u8],
    socket: &'a mut T,
}

impl<T: ErrorType> ErrorType for Prefixed<'_, T> {
    type Error = T::Error;
}

impl<T: Read> Read for Prefixed<'_, T> {
    async fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        if self.prefix.is_empty() {
            return self.socket.read(buf).await;
        }

        let len = self.prefix.len().min(buf.len());
        buf[..len].copy_from_slice(&self.prefix[..len]);
        self.prefix = &self.prefix[len..];
        Ok(len)
    }
}

async fn exchange<T>(
    socket: &mut T,
    id: ConnectionId,
    outbox: &Channel<CriticalSectionRawMutex, String, OUTBOX_DEPTH>,
) -> core::result::Result<(), WsError<T::Error>>
where
    T: Read + Write,
{
    let mut buf = [0_u8; MAXIMUM_PAYLOAD_SIZE];
    let mut lead = [0_u8; 1];

    loop {
        // Only a single read races with the outbox: it either completes with
        // the first byte of a frame or consumes nothing. Once a frame has
        // started, it is read to its end before any queued text is sent.
        let read = match select(socket.read(&mut lead), outbox.receive()).await {
            Either::First(read) => read.map_err(|e| WsError::Ws(edge_ws::Error::Io(e)))?,
            Either::Second(text) => {
                send_frame(socket, FrameType::Text(false), text.as_bytes()).await?;
                continue;
            }
        };

        if read == 0 {
            return Ok(());
        }

        let mut reader = Prefixed {
            prefix: &lead,
            socket: &mut *socket,
        };
        let header = FrameHeader::recv(&mut reader).await.map_err(WsError::Ws)?;
        let payload = header
            .recv_payload(&mut reader, &mut buf)
            .await
            .map_err(WsError::Ws)?;

        match header.frame_type {
            FrameType::Text(_) => {
                INBOUND
                    .send(Frame::text(id, String::from_utf8_lossy(payload)))
                    .await;
            }
            FrameType::Binary(_) => {
                INBOUND.send(Frame::binary(id, payload)).await;
            }
            FrameType::Ping => send_frame(socket, FrameType::Pong, payload).await?,
            FrameType::Close => {
                send_frame(socket, FrameType::Close, &[]).await?;
                return Ok(());
            }
            _ => {}
        }
    }
}

async fn send_frame<T>(
    socket: &mut T,
    frame_type: FrameType,
    payload: &[u8],
) -> core::result::Result<(), WsError<T::Error>>
where
    T: Write,
{
    // Servers never mask their frames.
    let header = FrameHeader {
        frame_type,
        payload_len: payload.len() as u64,
        mask_key: None,
    };

    header.send(&mut *socket).await.map_err(WsError::Ws)?;
    header
        .send_payload(&mut *socket, payload)
        .await
        .map_err(WsError::Ws)
}

#[cfg(test)]
mod tests {
    use edge_ws::{FrameHeader, FrameType};

    use embassy_futures::block_on;

    use super::Prefixed;

    #[test]
    fn frame_started_by_a_single_read_is_parsed_whole() {
        // Masked text frame `hi`, its first byte already read.
        let lead = [0x81];
        let mut rest: &[u8] = &[0x82, 1, 2, 3, 4, b'h' ^ 1, b'i' ^ 2, 0x89];

        let mut reader = Prefixed {
            prefix: &lead,
            socket: &mut rest,
        };
        let mut buf = [0_u8; 8];

        let header = block_on(FrameHeader::recv(&mut reader)).unwrap();
        assert!(matches!(header.frame_type, FrameType::Text(false)));
        assert_eq!(header.payload_len, 2);

        let payload = block_on(header.recv_payload(&mut reader, &mut buf)).unwrap();
        assert_eq!(payload, b"hi");

        // The next frame is left untouched.
        assert_eq!(rest, [0x89]);
    }
}
