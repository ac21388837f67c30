//! The single catch-all route (§4.5) that drives the whole dispatch pipeline: match a pool by
//! path/header, then either hand off to the WebSocket proxy engine or forward over HTTP.
//!
//! Payload limits mirror the donor's `routes/http.rs::configure_route` (1 MiB raw body and JSON),
//! reduced here to the one number the proxy engine also uses as its WebSocket frame cap.

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;

use crate::services::factory::Golb;
use crate::services::proxy::ProxyEngine;
use crate::services::websocket::WebSocketRegistry;

use super::websocket::handle_upgrade;

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

async fn dispatch(
    req: HttpRequest,
    mut payload: web::Payload,
    golb: web::Data<Golb>,
    proxy: web::Data<ProxyEngine>,
    registry: web::Data<WebSocketRegistry>,
) -> actix_web::Result<HttpResponse> {
    golb.stats.record_request();

    let path = req.path().to_string();
    let pool_name = golb
        .router
        .match_pool(&path, |name| req.headers().get(name).and_then(|v| v.to_str().ok()))
        .to_string();

    if ProxyEngine::is_websocket_upgrade(req.headers()) {
        return handle_upgrade(req, payload, &golb, &pool_name, registry.clone().into_inner()).await;
    }

    let mut buffer = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(actix_web::error::ErrorBadRequest)?;
        if buffer.len() + chunk.len() > MAX_PAYLOAD_BYTES {
            return Err(actix_web::error::ErrorPayloadTooLarge("request body exceeds the size limit"));
        }
        buffer.extend_from_slice(&chunk);
    }

    proxy
        .forward(&golb, &pool_name, &req, buffer.freeze())
        .await
        .map_err(actix_web::Error::from)
}

pub fn configure_dispatch(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/{tail:.*}").to(dispatch));
}
