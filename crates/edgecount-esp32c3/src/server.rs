use core::fmt::{Debug, Display};
use core::net::SocketAddr;

use edgecount::error::{Error as LoopError, Result as LoopResult};
use edgecount::http::{Method, Request, Response};

use edge_http::Method as EdgeMethod;
use edge_http::io::server::{Connection, Handler, Server as EdgeServer};
use edge_nal::{TcpBind, WithTimeout};
use edge_nal_embassy::{Tcp, TcpBuffers};

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use embedded_io_async::{Read, Write};

use log::{error, info};

use crate::error::Result;
use crate::net::wait_for_ip;

// Default port.
const DEFAULT_SERVER_PORT: u16 = 80;

// The maximum number of clients the HTTP server can support simultaneously.
const NUMBER_OF_CLIENTS: usize = 2;

// Socket buffer size.
const TX_SIZE: usize = 2048;
// Server buffer size.
const RX_SIZE: usize = 4096;
// Maximum number of allowed headers in a request.
const MAXIMUM_HEADERS_COUNT: usize = 32;
// Longest accepted request target.
const MAXIMUM_TARGET_LENGTH: usize = 256;

// The request waiting for the loop.
pub(crate) static REQUESTS: Channel<CriticalSectionRawMutex, LoopResult<Request>, 1> =
    Channel::new();
// The loop answer to the waiting request.
pub(crate) static RESPONSES: Signal<CriticalSectionRawMutex, Response> = Signal::new();
// Lets one client at a time talk to the loop, so that each response reaches
// the client which sent the request.
static TURN: Mutex<CriticalSectionRawMutex, ()> = Mutex::new(());

/// The `HTTP` server.
///
/// Every request is relayed to the main loop, which routes it and hands the
/// response back to the server.
///
/// ## Parameters
///
/// - **`port`**
///   The TCP port on which the server listens for incoming connections.
///   Defaults to `80`.
///
/// - **`keepalive_timeout_ms`**
///   Optional timeout (in milliseconds) for detecting an idle persistent
///   HTTP keep-alive connection. Idle connections are never closed by
///   default.
///
/// - **`io_timeout_ms`**
///   Optional timeout (in milliseconds) for socket I/O operations.
///   Read and write operations never time out by default.
pub struct HttpServer {
    port: u16,
    keepalive_timeout_ms: Option<u32>,
    io_timeout_ms: Option<u32>,
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServer {
    /// Creates an [`HttpServer`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            keepalive_timeout_ms: None,
            io_timeout_ms: None,
        }
    }

    /// Sets the port number for the server to listen on.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the timeout (in milliseconds) for persistent HTTP keep-alive
    /// connections.
    #[must_use]
    pub const fn keepalive_timeout(mut self, timeout_ms: u32) -> Self {
        self.keepalive_timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the timeout (in milliseconds) for socket I/O operations.
    #[must_use]
    pub const fn io_timeout(mut self, timeout_ms: u32) -> Self {
        self.io_timeout_ms = Some(timeout_ms);
        self
    }

    /// Returns the server port.
    #[must_use]
    pub const fn server_port(&self) -> u16 {
        self.port
    }

    /// Runs the [`HttpServer`] in its own task.
    ///
    /// # Errors
    ///
    /// Failure to spawn the server task.
    pub fn spawn(self, stack: Stack<'static>, spawner: Spawner) -> Result<()> {
        spawner
            .spawn(run_http_server(
                stack,
                self.port,
                self.keepalive_timeout_ms,
                self.io_timeout_ms,
            ))
            .map_err(core::convert::Into::into)
    }
}

#[embassy_executor::task]
async fn run_http_server(
    stack: Stack<'static>,
    port: u16,
    keepalive_timeout_ms: Option<u32>,
    io_timeout_ms: Option<u32>,
) {
    if let Err(e) = serve(stack, port, keepalive_timeout_ms, io_timeout_ms).await {
        error!("HTTP server stopped: {e}");
    }
}

async fn serve(
    stack: Stack<'static>,
    port: u16,
    keepalive_timeout_ms: Option<u32>,
    io_timeout_ms: Option<u32>,
) -> Result<()> {
    let buffers = TcpBuffers::<NUMBER_OF_CLIENTS, TX_SIZE, RX_SIZE>::new();
    let tcp = Tcp::new(stack, &buffers);

    let address = wait_for_ip(stack).await;
    let acceptor = tcp.bind(SocketAddr::new(address.into(), port)).await?;

    info!("Starting the HTTP server on address `{address}` and port `{port}`");

    let mut server = EdgeServer::<NUMBER_OF_CLIENTS, RX_SIZE, MAXIMUM_HEADERS_COUNT>::new();
    match io_timeout_ms {
        Some(timeout_ms) => {
            server
                .run(
                    keepalive_timeout_ms,
                    WithTimeout::new(timeout_ms, acceptor),
                    RelayHandler,
                )
                .await?;
        }
        None => server.run(keepalive_timeout_ms, acceptor, RelayHandler).await?,
    }

    Ok(())
}

const fn method(method: EdgeMethod) -> Method {
    match method {
        EdgeMethod::Get => Method::Get,
        EdgeMethod::Post => Method::Post,
        EdgeMethod::Put => Method::Put,
        EdgeMethod::Delete => Method::Delete,
        _ => Method::Other,
    }
}

struct RelayHandler;

impl Handler for RelayHandler {
    type Error<E>
        = edge_http::io::Error<E>
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
        let request = {
            let headers = conn.headers()?;
            if headers.path.len() > MAXIMUM_TARGET_LENGTH {
                Err(LoopError::request("Request target too long"))
            } else {
                Ok(Request::from_target(method(headers.method), headers.path))
            }
        };

        let response = {
            let _turn = TURN.lock().await;
            RESPONSES.reset();
            REQUESTS.send(request).await;
            RESPONSES.wait().await
        };

        let content_type = response
            .headers
            .content_type
            .map(|content_type| [("Content-Type", content_type)]);
        let headers: &[(&str, &str)] = content_type.as_ref().map_or(&[], |h| h.as_slice());

        conn.initiate_response(
            response.headers.status,
            Some(response.headers.message),
            headers,
        )
        .await?;

        conn.write_all(&response.body).await
    }
}
