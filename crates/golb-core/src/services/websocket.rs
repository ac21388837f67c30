//! WebSocket Proxy Engine (§4.5): upgrades the client socket, pairs it with a freshly opened
//! backend socket, and pumps frames between them until either side closes.
//!
//! The three-task shape (client->backend, backend->client, keepalive ticker) and the
//! frame-type-preserving forwarding are carried from the donor's
//! `services/websocket.rs::WebSocketHandler::handle_websocket`, collapsed into a single task
//! using `tokio::select!` so that any branch returning ends the pair atomically instead of
//! leaving two independently-spawned tasks to notice a peer closed. The `CloseCode` translation
//! table is lifted from the same donor method's inline match.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use actix_web::{web, Error as ActixError, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue, Request};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as TungsteniteCloseCode;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;

use crate::error::GatewayError;
use crate::models::backend::Backend;
use crate::services::factory::{Golb, Pool};
use crate::services::persistence::{DispatchContext, Persistence};

/// Headers that must be regenerated by the upgrade handshake itself and so are never copied from
/// the inbound client request onto the outbound backend request.
const SKIP_HANDSHAKE_HEADERS: &[&str] = &[
    "host",
    "connection",
    "upgrade",
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-accept",
    "sec-websocket-extensions",
    "sec-websocket-protocol",
];

/// Ping cadence sent to both peers while a pair is open (§4.5).
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
/// Maximum time without a pong before a pair is considered dead.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);
/// Maximum time a single frame write may take.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);
/// Largest single frame forwarded in either direction.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub backend_url: String,
    pub opened_at: Instant,
}

/// Tracks open WebSocket pairs for observability and coordinated shutdown (§4.5). Registration
/// and lookup are O(1) behind a single `RwLock`.
#[derive(Default)]
pub struct WebSocketRegistry {
    next_id: AtomicU64,
    pairs: RwLock<HashMap<u64, ConnectionInfo>>,
}

impl WebSocketRegistry {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), pairs: RwLock::new(HashMap::new()) }
    }

    fn register(&self, backend_url: String) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pairs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, ConnectionInfo { backend_url, opened_at: Instant::now() });
        ConnectionId(id)
    }

    fn unregister(&self, id: ConnectionId) {
        self.pairs.write().unwrap_or_else(|e| e.into_inner()).remove(&id.0);
    }

    pub fn len(&self) -> usize {
        self.pairs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.pairs.read().unwrap_or_else(|e| e.into_inner()).values().cloned().collect()
    }
}

/// Builds the backend WebSocket URL for `backend`, translating its scheme (http -> ws, https ->
/// wss) and appending `path` unchanged.
fn build_backend_url(backend: &Backend, path: &str) -> String {
    format!("{}://{}:{}{}{}", backend.scheme.ws_scheme(), backend.host, backend.port, backend.path_prefix, path)
}

/// Builds the outbound handshake request for `backend_url`, carrying over every header from the
/// inbound client request except those the handshake itself must regenerate.
fn build_backend_request(
    backend_url: &str,
    req: &HttpRequest,
) -> Result<Request<()>, tokio_tungstenite::tungstenite::Error> {
    let mut request = backend_url.into_client_request()?;
    let headers = request.headers_mut();
    for (name, value) in req.headers() {
        if SKIP_HANDSHAKE_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_ref()), HeaderValue::from_bytes(value.as_bytes()))
        {
            headers.insert(name, value);
        }
    }
    Ok(request)
}

/// Extracts the persistence cookie from the inbound request, mirroring
/// [`crate::services::proxy`]'s own `extract_cookie` so Cookie persistence stays sticky across
/// the HTTP-to-WebSocket protocol switch.
fn extract_cookie(req: &HttpRequest, pool: &Pool) -> Option<String> {
    let name = match &pool.persistence {
        Persistence::Cookie(policy) => policy.cookie_name.as_str(),
        _ => return None,
    };
    req.headers()
        .get(actix_web::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name).then(|| v.to_string())
        })
}

fn translate_close_code(code: TungsteniteCloseCode) -> actix_ws::CloseCode {
    match code {
        TungsteniteCloseCode::Normal => actix_ws::CloseCode::Normal,
        TungsteniteCloseCode::Away => actix_ws::CloseCode::Away,
        TungsteniteCloseCode::Protocol => actix_ws::CloseCode::Protocol,
        TungsteniteCloseCode::Unsupported => actix_ws::CloseCode::Unsupported,
        TungsteniteCloseCode::Abnormal => actix_ws::CloseCode::Abnormal,
        TungsteniteCloseCode::Invalid => actix_ws::CloseCode::Invalid,
        TungsteniteCloseCode::Policy => actix_ws::CloseCode::Policy,
        TungsteniteCloseCode::Size => actix_ws::CloseCode::Size,
        TungsteniteCloseCode::Extension => actix_ws::CloseCode::Extension,
        TungsteniteCloseCode::Error => actix_ws::CloseCode::Error,
        TungsteniteCloseCode::Restart => actix_ws::CloseCode::Restart,
        TungsteniteCloseCode::Again => actix_ws::CloseCode::Again,
        _ => actix_ws::CloseCode::Error,
    }
}

/// Dispatches a pool member for `path`, upgrades the client connection, opens a matching backend
/// connection, and pumps frames between them until either side closes or errors.
pub async fn proxy_websocket(
    req: HttpRequest,
    stream: web::Payload,
    golb: &Golb,
    pool_name: &str,
    registry: Arc<WebSocketRegistry>,
) -> Result<HttpResponse, ActixError> {
    let pool = golb
        .pool(pool_name)
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable(GatewayError::NoBackendAvailable {
            pool: pool_name.to_string(),
        }))?;

    let path = req.path().to_string();
    let client_ip = req.connection_info().realip_remote_addr().map(|s| s.to_string());
    let cookie_value = extract_cookie(&req, pool);
    let ctx = DispatchContext {
        cookie_value: cookie_value.as_deref(),
        client_ip: client_ip.as_deref(),
        path: &path,
    };
    let selection = pool
        .persistence
        .choose(&ctx, &pool.backends, &pool.scheduler)
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable(GatewayError::NoBackendAvailable {
            pool: pool_name.to_string(),
        }))?;
    let backend = pool.backends[selection.index].clone();
    let backend_url = build_backend_url(&backend, &path);

    info!("upgrading websocket connection to {}", backend_url);
    let (response, mut client_session, mut client_stream) = actix_ws::handle(&req, stream)?;

    let backend_request = match build_backend_request(&backend_url, &req) {
        Ok(request) => request,
        Err(e) => {
            error!("failed to build backend handshake request for {}: {}", backend_url, e);
            return Ok(HttpResponse::BadGateway().body(format!("backend handshake build failed: {}", e)));
        }
    };

    let (backend_ws, _) = match connect_async(backend_request).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("backend websocket connect failed for {}: {}", backend_url, e);
            backend.record_failure(golb.failure_threshold, golb.revival_delay);
            let _ = client_session
                .close(Some(actix_ws::CloseReason {
                    code: actix_ws::CloseCode::Error,
                    description: Some(format!("backend connection failed: {}", e)),
                }))
                .await;
            return Ok(HttpResponse::BadGateway().body(format!("backend connection failed: {}", e)));
        }
    };
    let (mut backend_write, mut backend_read) = backend_ws.split();

    backend.inc_active_connections();
    let connection_id = registry.register(backend_url.clone());
    let registry = registry.clone();

    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(DEFAULT_PING_INTERVAL);
        let mut last_pong = Instant::now();
        loop {
            tokio::select! {
                client_msg = client_stream.next() => {
                    let Some(Ok(msg)) = client_msg else {
                        let _ = backend_write.close().await;
                        break;
                    };
                    if !forward_to_backend(msg, &mut backend_write).await {
                        break;
                    }
                }
                backend_msg = backend_read.next() => {
                    match backend_msg {
                        Some(Ok(msg)) => {
                            if let TungsteniteMessage::Pong(_) = &msg {
                                last_pong = Instant::now();
                            }
                            if !forward_to_client(msg, &mut client_session).await {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("error reading from backend {}: {}", backend_url, e);
                            let _ = client_session
                                .close(Some(actix_ws::CloseReason {
                                    code: actix_ws::CloseCode::Error,
                                    description: Some(format!("backend error: {}", e)),
                                }))
                                .await;
                            break;
                        }
                        None => {
                            let _ = client_session.close(None).await;
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if last_pong.elapsed() > DEFAULT_PONG_WAIT {
                        debug!("pong wait exceeded for {}, closing pair", backend_url);
                        let _ = client_session.close(Some(actix_ws::CloseReason {
                            code: actix_ws::CloseCode::Away,
                            description: Some("keepalive timeout".into()),
                        })).await;
                        break;
                    }
                    let write = tokio::time::timeout(DEFAULT_WRITE_WAIT, async {
                        let _ = client_session.ping(b"").await;
                        backend_write.send(TungsteniteMessage::Ping(Vec::new())).await
                    }).await;
                    if write.is_err() || write.is_ok_and(|r| r.is_err()) {
                        break;
                    }
                }
            }
        }
        backend.dec_active_connections();
        registry.unregister(connection_id);
        debug!("websocket pair {:?} closed", connection_id);
    });

    Ok(response)
}

async fn forward_to_backend(
    msg: Message,
    backend_write: &mut (impl SinkExt<TungsteniteMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
) -> bool {
    let translated = match msg {
        Message::Text(text) => {
            if text.len() > MAX_FRAME_BYTES {
                return false;
            }
            TungsteniteMessage::Text(text.to_string())
        }
        Message::Binary(bin) => {
            if bin.len() > MAX_FRAME_BYTES {
                return false;
            }
            TungsteniteMessage::Binary(bin.to_vec())
        }
        Message::Ping(bytes) => TungsteniteMessage::Ping(bytes.to_vec()),
        Message::Pong(bytes) => TungsteniteMessage::Pong(bytes.to_vec()),
        Message::Close(_) => {
            let _ = backend_write.close().await;
            return false;
        }
        _ => return true,
    };
    backend_write.send(translated).await.is_ok()
}

async fn forward_to_client(msg: TungsteniteMessage, client_session: &mut actix_ws::Session) -> bool {
    match msg {
        TungsteniteMessage::Text(text) => {
            text.len() <= MAX_FRAME_BYTES && client_session.text(text).await.is_ok()
        }
        TungsteniteMessage::Binary(bin) => {
            bin.len() <= MAX_FRAME_BYTES && client_session.binary(bin).await.is_ok()
        }
        TungsteniteMessage::Ping(bytes) => client_session.pong(&bytes).await.is_ok(),
        TungsteniteMessage::Pong(_) => true,
        TungsteniteMessage::Close(reason) => {
            let close_reason = reason.map(|r| actix_ws::CloseReason {
                code: translate_close_code(r.code),
                description: Some(r.reason.to_string()),
            });
            let _ = client_session.clone().close(close_reason).await;
            false
        }
        TungsteniteMessage::Frame(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::Scheme;

    #[test]
    fn backend_url_translates_http_to_ws() {
        let backend = Backend::new(Scheme::Http, "10.0.0.1".into(), 8080, String::new(), 1);
        assert_eq!(build_backend_url(&backend, "/socket"), "ws://10.0.0.1:8080/socket");
    }

    #[test]
    fn backend_url_translates_https_to_wss() {
        let backend = Backend::new(Scheme::Https, "10.0.0.1".into(), 443, "/v2".into(), 1);
        assert_eq!(build_backend_url(&backend, "/socket"), "wss://10.0.0.1:443/v2/socket");
    }

    #[test]
    fn close_code_translation_covers_normal_and_error() {
        assert_eq!(translate_close_code(TungsteniteCloseCode::Normal), actix_ws::CloseCode::Normal);
        assert_eq!(translate_close_code(TungsteniteCloseCode::Size), actix_ws::CloseCode::Size);
    }

    #[test]
    fn registry_tracks_open_pairs() {
        let registry = WebSocketRegistry::new();
        assert!(registry.is_empty());
        let id = registry.register("ws://h:80".into());
        assert_eq!(registry.len(), 1);
        registry.unregister(id);
        assert!(registry.is_empty());
    }
}
