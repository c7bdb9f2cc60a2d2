use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Method as AxumMethod, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response as AxumResponse};

use edgecount::error::{Error as LoopError, Result as LoopResult};
use edgecount::http::{Method, Request, Response};
use edgecount::websocket::{ConnectionId, Frame};

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tracing::{error, info, warn};

// Longest accepted request target.
const MAX_TARGET_LEN: usize = 1024;

// A request waiting for the loop to answer it.
pub(crate) struct PendingRequest {
    pub(crate) request: LoopResult<Request>,
    pub(crate) reply: oneshot::Sender<Response>,
}

// What a WebSocket connection task tells the loop.
pub(crate) enum WsEvent {
    Opened {
        frame: Frame,
        outbox: mpsc::UnboundedSender<String>,
    },
    Frame(Frame),
}

// Connection identifiers in use.
#[derive(Clone)]
pub(crate) struct Slots(Arc<Mutex<Vec<bool>>>);

impl Slots {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, usize::from(u8::MAX) + 1);
        Self(Arc::new(Mutex::new(vec![false; capacity])))
    }

    pub(crate) fn acquire(&self) -> Option<ConnectionId> {
        let mut slots = self.0.lock().ok()?;
        let index = slots.iter().position(|used| !used)?;
        let id = u8::try_from(index).ok()?;
        slots[index] = true;
        Some(ConnectionId(id))
    }

    pub(crate) fn release(&self, id: ConnectionId) {
        if let Ok(mut slots) = self.0.lock()
            && let Some(slot) = slots.get_mut(usize::from(id.0))
        {
            *slot = false;
        }
    }
}

#[derive(Clone)]
struct WsState {
    events: mpsc::UnboundedSender<WsEvent>,
    slots: Slots,
}

pub(crate) async fn spawn_http(
    address: SocketAddr,
    requests: mpsc::Sender<PendingRequest>,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(address).await?;
    let local = listener.local_addr()?;

    let app = Router::new().fallback(serve_http).with_state(requests);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server stopped: {e}");
        }
    });

    info!("HTTP server listening on {local}");
    Ok((local, handle))
}

pub(crate) async fn spawn_ws(
    address: SocketAddr,
    events: mpsc::UnboundedSender<WsEvent>,
    slots: Slots,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(address).await?;
    let local = listener.local_addr()?;

    let app = Router::new()
        .fallback(upgrade)
        .with_state(WsState { events, slots });

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            error!("WebSocket server stopped: {e}");
        }
    });

    info!("WebSocket server listening on {local}");
    Ok((local, handle))
}

async fn serve_http(
    State(requests): State<mpsc::Sender<PendingRequest>>,
    method: AxumMethod,
    uri: Uri,
) -> AxumResponse {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |target| target.as_str());

    let request = if target.len() > MAX_TARGET_LEN {
        Err(LoopError::request("Request target too long"))
    } else {
        Ok(Request::from_target(to_method(&method), target))
    };

    let (reply, response) = oneshot::channel();
    if requests.send(PendingRequest { request, reply }).await.is_err() {
        return unavailable();
    }

    match response.await {
        Ok(response) => into_axum(response),
        Err(_) => unavailable(),
    }
}

fn to_method(method: &AxumMethod) -> Method {
    match method.as_str() {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "DELETE" => Method::Delete,
        _ => Method::Other,
    }
}

fn into_axum(response: Response) -> AxumResponse {
    let status = StatusCode::from_u16(response.headers.status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut axum_response = (status, response.body.into_owned()).into_response();
    if let Some(content_type) = response.headers.content_type {
        let _ = axum_response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    axum_response
}

fn unavailable() -> AxumResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "Loop stopped\n").into_response()
}

async fn upgrade(
    State(state): State<WsState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> AxumResponse {
    let Some(id) = state.slots.acquire() else {
        warn!("Refusing the WebSocket connection from {peer}: too many connections");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections\n").into_response();
    };

    let slots = state.slots.clone();
    ws.on_failed_upgrade(move |e| {
        error!("[{id}] WebSocket upgrade failed: {e}");
        slots.release(id);
    })
    .on_upgrade(move |socket| serve_socket(socket, id, peer, uri, state))
}

async fn serve_socket(
    mut socket: WebSocket,
    id: ConnectionId,
    peer: SocketAddr,
    uri: Uri,
    state: WsState,
) {
    let (outbox, mut inbox) = mpsc::unbounded_channel::<String>();

    let opened = WsEvent::Opened {
        frame: Frame::connected(id, uri.path(), Some(peer)),
        outbox,
    };

    if state.events.send(opened).is_ok() {
        loop {
            tokio::select! {
                message = socket.recv() => {
                    let frame = match message {
                        Some(Ok(Message::Text(text))) => Frame::text(id, text.as_str()),
                        Some(Ok(Message::Binary(bytes))) => Frame::binary(id, bytes.to_vec()),
                        Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                        // Pings are answered by the socket itself.
                        Some(Ok(_)) => continue,
                    };
                    if state.events.send(WsEvent::Frame(frame)).is_err() {
                        break;
                    }
                }
                text = inbox.recv() => {
                    let Some(text) = text else {
                        break;
                    };
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        warn!("[{id}] Failed to send a text frame: {e}");
                        break;
                    }
                }
            }
        }

        let _ = state.events.send(WsEvent::Frame(Frame::disconnected(id)));
    }

    state.slots.release(id);
}

#[cfg(test)]
mod tests {
    use axum::http::Method as AxumMethod;

    use edgecount::http::{Method, Response};
    use edgecount::websocket::ConnectionId;

    use super::{Slots, into_axum, to_method};

    #[test]
    fn slots_are_reused() {
        let slots = Slots::new(2);

        assert_eq!(slots.acquire(), Some(ConnectionId(0)));
        assert_eq!(slots.acquire(), Some(ConnectionId(1)));
        assert_eq!(slots.acquire(), None);

        slots.release(ConnectionId(0));
        assert_eq!(slots.acquire(), Some(ConnectionId(0)));

        // Out of range identifiers are ignored.
        slots.release(ConnectionId(9));
        assert_eq!(slots.acquire(), None);
    }

    #[test]
    fn methods() {
        assert_eq!(to_method(&AxumMethod::GET), Method::Get);
        assert_eq!(to_method(&AxumMethod::DELETE), Method::Delete);
        assert_eq!(to_method(&AxumMethod::PATCH), Method::Other);
    }

    #[test]
    fn responses_keep_status_and_content_type() {
        let response = into_axum(Response::content("text/html", "<p>hi</p>"));
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/html");

        let response = into_axum(Response::not_found("missing\n".into()));
        assert_eq!(response.status(), 404);
        assert_eq!(response.headers()["content-type"], "text/plain");
    }
}
