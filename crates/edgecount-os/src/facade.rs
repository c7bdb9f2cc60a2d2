use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use edgecount::error::{Error as LoopError, Result as LoopResult};
use edgecount::http::{Request, Response};
use edgecount::scheduler::NetworkFacade;
use edgecount::websocket::{ConnectionId, Frame, FrameType};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tracing::debug;

use crate::error::Result;
use crate::server::{PendingRequest, Slots, WsEvent, spawn_http, spawn_ws};

// Default HTTP port.
const HTTP_PORT: u16 = 80;
// Default WebSocket port.
const WS_PORT: u16 = 81;
// Default number of simultaneous WebSocket connections.
const MAX_CONNECTIONS: usize = 16;
// Default number of HTTP requests waiting for the loop.
const REQUEST_QUEUE: usize = 8;

/// The [`OsFacade`] configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsFacadeConfig {
    http_address: SocketAddr,
    ws_address: SocketAddr,
    max_connections: usize,
    request_queue: usize,
}

impl Default for OsFacadeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OsFacadeConfig {
    /// Creates an [`OsFacadeConfig`] listening on all interfaces, with the
    /// `HTTP` server on port 80 and the `WebSocket` server on port 81.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), HTTP_PORT),
            ws_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), WS_PORT),
            max_connections: MAX_CONNECTIONS,
            request_queue: REQUEST_QUEUE,
        }
    }

    /// Sets the `HTTP` server address.
    #[must_use]
    pub const fn http_address(mut self, address: SocketAddr) -> Self {
        self.http_address = address;
        self
    }

    /// Sets the `WebSocket` server address.
    #[must_use]
    pub const fn ws_address(mut self, address: SocketAddr) -> Self {
        self.ws_address = address;
        self
    }

    /// Sets the maximum number of simultaneous `WebSocket` connections.
    ///
    /// It is clamped between 1 and 256.
    #[must_use]
    pub const fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Sets the number of `HTTP` requests which can wait for the loop.
    #[must_use]
    pub const fn request_queue(mut self, request_queue: usize) -> Self {
        self.request_queue = request_queue;
        self
    }

    /// Starts the servers and returns the [`OsFacade`] polling them.
    ///
    /// Must be called within a `tokio` runtime.
    ///
    /// # Errors
    ///
    /// A server address cannot be bound.
    pub async fn start(self) -> Result<OsFacade> {
        let (requests_tx, requests) = mpsc::channel(self.request_queue.max(1));
        let (events_tx, events) = mpsc::unbounded_channel();

        let (http_address, http) = spawn_http(self.http_address, requests_tx).await?;
        let (ws_address, ws) = match spawn_ws(
            self.ws_address,
            events_tx,
            Slots::new(self.max_connections),
        )
        .await
        {
            Ok(server) => server,
            Err(e) => {
                http.abort();
                return Err(e.into());
            }
        };

        let mut facade = OsFacade::from_queues(requests, events);
        facade.http_address = Some(http_address);
        facade.ws_address = Some(ws_address);
        facade.servers = vec![http, ws];

        Ok(facade)
    }
}

/// A [`NetworkFacade`] over an `HTTP` and a `WebSocket` server running as
/// `tokio` tasks.
///
/// Requests and frames reach the facade through queues, so polling never
/// blocks. The facade owns the table of open `WebSocket` connections.
///
/// Dropping the facade stops the servers.
pub struct OsFacade {
    requests: mpsc::Receiver<PendingRequest>,
    pending: Option<oneshot::Sender<Response>>,
    events: mpsc::UnboundedReceiver<WsEvent>,
    connections: BTreeMap<ConnectionId, mpsc::UnboundedSender<String>>,
    http_address: Option<SocketAddr>,
    ws_address: Option<SocketAddr>,
    servers: Vec<JoinHandle<()>>,
}

impl OsFacade {
    pub(crate) fn from_queues(
        requests: mpsc::Receiver<PendingRequest>,
        events: mpsc::UnboundedReceiver<WsEvent>,
    ) -> Self {
        Self {
            requests,
            pending: None,
            events,
            connections: BTreeMap::new(),
            http_address: None,
            ws_address: None,
            servers: Vec::new(),
        }
    }

    /// Returns the bound `HTTP` server address.
    #[must_use]
    pub const fn http_address(&self) -> Option<SocketAddr> {
        self.http_address
    }

    /// Returns the bound `WebSocket` server address.
    #[must_use]
    pub const fn ws_address(&self) -> Option<SocketAddr> {
        self.ws_address
    }

    /// Returns the number of open `WebSocket` connections known to the loop.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.connections.len()
    }
}

impl Drop for OsFacade {
    fn drop(&mut self) {
        for server in &self.servers {
            server.abort();
        }
    }
}

impl NetworkFacade for OsFacade {
    fn poll_http(&mut self) -> LoopResult<Option<Request>> {
        match self.requests.try_recv() {
            Ok(PendingRequest { request, reply }) => {
                self.pending = Some(reply);
                request.map(Some)
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LoopError::network("HTTP server stopped")),
        }
    }

    fn send_http_response(&mut self, response: Response) -> LoopResult<()> {
        let reply = self
            .pending
            .take()
            .ok_or_else(|| LoopError::request("No pending request"))?;

        reply
            .send(response)
            .map_err(|_| LoopError::request("The client went away"))
    }

    fn poll_ws_frame(&mut self) -> LoopResult<Option<Frame>> {
        match self.events.try_recv() {
            Ok(WsEvent::Opened { frame, outbox }) => {
                let _ = self.connections.insert(frame.connection, outbox);
                Ok(Some(frame))
            }
            Ok(WsEvent::Frame(frame)) => {
                if frame.kind == FrameType::Disconnected {
                    let _ = self.connections.remove(&frame.connection);
                }
                Ok(Some(frame))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(LoopError::network("WebSocket server stopped"))
            }
        }
    }

    fn send_ws_text(&mut self, connection: ConnectionId, text: &str) -> LoopResult<()> {
        let outbox = self
            .connections
            .get(&connection)
            .ok_or_else(|| LoopError::request(format!("Connection {connection} is closed")))?;

        outbox
            .send(text.to_owned())
            .map_err(|_| LoopError::request(format!("Connection {connection} is closed")))
    }

    fn broadcast_ws_text(&mut self, text: &str) -> LoopResult<()> {
        self.connections
            .retain(|_, outbox| outbox.send(text.to_owned()).is_ok());
        debug!("Broadcast to {} connections: {text}", self.connections.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use edgecount::channel::{ChannelId, SignalChannel};
    use edgecount::error::Error as LoopError;
    use edgecount::http::{Method, Request, Response};
    use edgecount::monitor::Monitor;
    use edgecount::routes::Router;
    use edgecount::scheduler::{CooperativeScheduler, NetworkFacade};
    use edgecount::websocket::{ConnectionId, Frame};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::{mpsc, oneshot};

    use crate::server::{PendingRequest, WsEvent};

    use super::{OsFacade, OsFacadeConfig};

    const LOCALHOST: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

    #[test]
    fn connection_table_follows_the_frames() {
        let (_requests_tx, requests) = mpsc::channel(1);
        let (events_tx, events) = mpsc::unbounded_channel();
        let mut facade = OsFacade::from_queues(requests, events);

        let (outbox, mut inbox) = mpsc::unbounded_channel();
        events_tx
            .send(WsEvent::Opened {
                frame: Frame::connected(ConnectionId(4), "/", None),
                outbox,
            })
            .unwrap();

        assert!(facade.poll_ws_frame().unwrap().is_some());
        assert_eq!(facade.connections(), 1);

        facade.send_ws_text(ConnectionId(4), "Connected").unwrap();
        facade.broadcast_ws_text("{}").unwrap();
        assert_eq!(inbox.try_recv().unwrap(), "Connected");
        assert_eq!(inbox.try_recv().unwrap(), "{}");

        events_tx
            .send(WsEvent::Frame(Frame::disconnected(ConnectionId(4))))
            .unwrap();
        assert!(facade.poll_ws_frame().unwrap().is_some());
        assert_eq!(facade.connections(), 0);
        assert!(matches!(
            facade.send_ws_text(ConnectionId(4), "late"),
            Err(LoopError::RequestHandling(_))
        ));

        assert_eq!(facade.poll_ws_frame(), Ok(None));
        drop(events_tx);
        assert!(facade.poll_ws_frame().unwrap_err().is_fatal());
    }

    #[test]
    fn broadcast_forgets_vanished_connections() {
        let (_requests_tx, requests) = mpsc::channel(1);
        let (events_tx, events) = mpsc::unbounded_channel();
        let mut facade = OsFacade::from_queues(requests, events);

        let mut inboxes = Vec::new();
        for id in 0..3 {
            let (outbox, inbox) = mpsc::unbounded_channel::<String>();
            events_tx
                .send(WsEvent::Opened {
                    frame: Frame::connected(ConnectionId(id), "/", None),
                    outbox,
                })
                .unwrap();
            inboxes.push(inbox);
        }
        while facade.poll_ws_frame().unwrap().is_some() {}
        assert_eq!(facade.connections(), 3);

        // The tasks of the last two connections are gone.
        inboxes.truncate(1);
        facade.broadcast_ws_text("{}").unwrap();
        assert_eq!(facade.connections(), 1);
    }

    #[test]
    fn requests_are_answered_once() {
        let (requests_tx, requests) = mpsc::channel(2);
        let (_events_tx, events) = mpsc::unbounded_channel();
        let mut facade = OsFacade::from_queues(requests, events);

        let (reply, response) = oneshot::channel();
        requests_tx
            .try_send(PendingRequest {
                request: Ok(Request::new(Method::Get, "/")),
                reply,
            })
            .map_err(|_| ())
            .unwrap();

        assert_eq!(
            facade.poll_http(),
            Ok(Some(Request::new(Method::Get, "/")))
        );
        facade.send_http_response(Response::text("ok")).unwrap();
        assert_eq!(response.blocking_recv().unwrap().body_text(), "ok");

        assert!(matches!(
            facade.send_http_response(Response::text("again")),
            Err(LoopError::RequestHandling(_))
        ));

        drop(requests_tx);
        assert!(facade.poll_http().unwrap_err().is_fatal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn serves_http_over_tcp() {
        static CHANNEL: SignalChannel = SignalChannel::new(ChannelId(23), 100);

        let facade = OsFacadeConfig::new()
            .http_address(LOCALHOST)
            .ws_address(LOCALHOST)
            .start()
            .await
            .unwrap();
        let http = facade.http_address().unwrap();

        let mut scheduler =
            CooperativeScheduler::new(facade, Router::new(), Monitor::new().channel(&CHANNEL));

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(http).await.unwrap();
            stream
                .write_all(b"GET /inline HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();

            let mut response = String::new();
            let _ = stream.read_to_string(&mut response).await.unwrap();
            response
        });

        while !client.is_finished() {
            let _ = scheduler.iterate().unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("content-type: text/plain"));
        assert!(response.ends_with("this works as well"));
    }
}
