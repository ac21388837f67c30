//! WebSocket upgrade endpoint: thin wrapper handing the request to the WebSocket proxy engine.

use std::sync::Arc;

use actix_web::{web, Error, HttpRequest, HttpResponse};

use crate::services::factory::Golb;
use crate::services::websocket::{proxy_websocket, WebSocketRegistry};

pub async fn handle_upgrade(
    req: HttpRequest,
    stream: web::Payload,
    golb: &Golb,
    pool: &str,
    registry: Arc<WebSocketRegistry>,
) -> Result<HttpResponse, Error> {
    proxy_websocket(req, stream, golb, pool, registry).await
}
