//! HTTP Proxy Engine (§4.5): dispatch, forward, retry, and map the result back to an
//! `HttpResponse`.
//!
//! Header filtering, method conversion, and the default `user-agent` fallback are carried
//! directly from the donor's `services/http.rs::build_headers_optimized`/`parse_method`. The
//! retry loop is grounded in the same file's `handle_request_internal`, generalized from
//! per-route circuit breakers to this crate's per-backend [`Backend::record_failure`] accounting
//! and re-entering dispatch (instead of iterating a fixed backend list) on each retry, since a
//! retry here means "ask the scheduler again," not "try the next item in a list."

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header::HeaderMap as ActixHeaderMap;
use actix_web::http::{Method as ActixMethod, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, warn};
use reqwest::{
    header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue},
    Client, Method as ReqwestMethod,
};

use crate::error::GatewayError;
use crate::models::backend::Backend;
use crate::services::factory::{Golb, Pool};
use crate::services::persistence::DispatchContext;

/// Request hop budget: at most this many backend attempts per inbound request (§4.5).
pub const DEFAULT_HOP_LIMIT: u32 = 3;
const DEFAULT_USER_AGENT: &str = "golb/0.1.0";
const SKIP_REQUEST_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection"];

/// Owns the outbound HTTP client used to reach backends. One instance is built at startup and
/// shared (via `Arc`) across actix worker threads, mirroring the donor's pooled `reqwest::Client`.
pub struct ProxyEngine {
    client: Client,
    hop_limit: u32,
}

impl ProxyEngine {
    pub fn new() -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("failed to build the outbound HTTP client");
        Self { client, hop_limit: DEFAULT_HOP_LIMIT }
    }

    /// Detects an inbound WebSocket upgrade request (§4.5): `Connection: Upgrade` plus
    /// `Upgrade: websocket`, checked case-insensitively.
    pub fn is_websocket_upgrade(headers: &ActixHeaderMap) -> bool {
        let has_upgrade_token = headers
            .get("connection")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_lowercase().split(',').any(|tok| tok.trim() == "upgrade"));
        let wants_websocket = headers
            .get("upgrade")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        has_upgrade_token && wants_websocket
    }

    /// Dispatches to the named pool, forwards the request, and retries against a freshly
    /// re-dispatched backend (bounded by `hop_limit`) on transport failure.
    pub async fn forward(
        &self,
        golb: &Golb,
        pool_name: &str,
        req: &HttpRequest,
        body: web::Bytes,
    ) -> Result<HttpResponse, GatewayError> {
        let pool = golb
            .pool(pool_name)
            .ok_or_else(|| GatewayError::NoBackendAvailable { pool: pool_name.to_string() })?;

        let path = req.path().to_string();
        let query = req.query_string().to_string();
        let method = parse_method(req.method());
        let headers = build_headers(req.headers());
        let cookie_value = extract_cookie(req.headers(), pool);
        let client_ip = req.connection_info().realip_remote_addr().map(|s| s.to_string());

        let mut last_error = GatewayError::NoBackendAvailable { pool: pool_name.to_string() };

        for hop in 0..self.hop_limit {
            let ctx = DispatchContext {
                cookie_value: cookie_value.as_deref(),
                client_ip: client_ip.as_deref(),
                path: &path,
            };
            let Some(selection) = pool.persistence.choose(&ctx, &pool.backends, &pool.scheduler) else {
                return Err(GatewayError::NoBackendAvailable { pool: pool_name.to_string() });
            };
            let backend = pool.backends[selection.index].clone();

            backend.inc_active_connections();
            let target_url = if query.is_empty() {
                format!("{}{}", backend.url(), path)
            } else {
                format!("{}{}?{}", backend.url(), path, query)
            };
            if hop > 0 {
                warn!("retrying request to pool '{}' via {}", pool_name, target_url);
            } else {
                debug!("forwarding request to {}", target_url);
            }

            let outcome = self
                .client
                .request(method.clone(), &target_url)
                .headers(headers.clone())
                .body(body.to_vec())
                .send()
                .await;
            backend.dec_active_connections();

            match outcome {
                Ok(response) => {
                    backend.record_success();
                    return Ok(build_response(response, selection.set_cookie).await?);
                }
                Err(err) => {
                    backend.record_failure(golb.failure_threshold, golb.revival_delay);
                    last_error = GatewayError::BackendTransportError {
                        backend: backend.url(),
                        message: err.to_string(),
                    };
                }
            }
        }

        warn!("retries exhausted for pool '{}': {}", pool_name, last_error);
        Err(GatewayError::RetriesExhausted { hops: self.hop_limit })
    }
}

impl Default for ProxyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_cookie(headers: &ActixHeaderMap, pool: &Pool) -> Option<String> {
    let name = match &pool.persistence {
        crate::services::persistence::Persistence::Cookie(policy) => policy.cookie_name.as_str(),
        _ => return None,
    };
    headers.get(actix_web::http::header::COOKIE)?.to_str().ok()?.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

async fn build_response(
    response: reqwest::Response,
    set_cookie: Option<String>,
) -> Result<HttpResponse, GatewayError> {
    let status_code = response.status().as_u16();
    let mut builder = HttpResponse::build(
        StatusCode::from_u16(status_code).unwrap_or(StatusCode::BAD_GATEWAY),
    );

    for (key, value) in response.headers() {
        if key.as_str().eq_ignore_ascii_case("connection") {
            continue;
        }
        if let Ok(header_value) = actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
            builder.insert_header((key.as_str(), header_value));
        }
    }
    if let Some(cookie) = set_cookie {
        builder.insert_header(("set-cookie", cookie));
    }

    let backend_url = response.url().to_string();
    let bytes = response.bytes().await.map_err(|e| GatewayError::BackendProtocolError {
        backend: backend_url,
        message: e.to_string(),
    })?;
    Ok(builder.body(bytes))
}

/// Filters hop-by-hop headers and applies the default `user-agent`, matching the donor's
/// `build_headers_optimized`.
fn build_headers(original: &ActixHeaderMap) -> ReqwestHeaderMap {
    let mut headers = ReqwestHeaderMap::with_capacity(original.len());
    for (key, value) in original {
        let key_str = key.as_str().to_lowercase();
        if SKIP_REQUEST_HEADERS.iter().any(|&skip| key_str.starts_with(skip)) {
            continue;
        }
        if let (Ok(name), Ok(val)) =
            (HeaderName::from_bytes(key.as_ref()), HeaderValue::from_bytes(value.as_bytes()))
        {
            headers.insert(name, val);
        }
    }
    headers.entry("user-agent").or_insert_with(|| HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

fn parse_method(method: &ActixMethod) -> ReqwestMethod {
    ReqwestMethod::from_bytes(method.as_str().as_bytes()).unwrap_or(ReqwestMethod::GET)
}

#[allow(dead_code)]
fn backend_display(backend: &Arc<Backend>) -> String {
    backend.url()
}
