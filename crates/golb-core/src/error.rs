//! Gateway-wide error taxonomy.
//!
//! Variants correspond to the error kinds a dispatch can fail with, not to specific type names
//! used elsewhere in the codebase. Each variant carries enough context to log a useful message and
//! maps to a single HTTP status code via [`actix_web::ResponseError`].

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Errors produced while dispatching, proxying, or configuring the load balancer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A scheduler (possibly wrapped by a persistence decorator) found no alive backend.
    #[error("no healthy backends available for pool '{pool}'")]
    NoBackendAvailable { pool: String },

    /// Connect refused, TLS handshake failure, or an early read error before response headers.
    #[error("transport error reaching backend {backend}: {message}")]
    BackendTransportError { backend: String, message: String },

    /// A malformed response arrived after headers had already started streaming to the client.
    #[error("protocol error from backend {backend}: {message}")]
    BackendProtocolError { backend: String, message: String },

    /// Either side of a WebSocket pair errored or closed unexpectedly.
    #[error("websocket peer error: {0}")]
    WebSocketPeerError(String),

    /// Raised only while loading configuration; fatal to the embedding process.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A session cookie parsed but its MD5 fingerprint did not match the referenced backend.
    #[error("tampered session cookie")]
    TamperedCookie,

    /// The retry hop limit was exhausted without a successful dispatch.
    #[error("retries exhausted after {hops} hops")]
    RetriesExhausted { hops: u32 },
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoBackendAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BackendTransportError { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::BackendProtocolError { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::WebSocketPeerError(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::TamperedCookie => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::NoBackendAvailable { .. } => HttpResponse::ServiceUnavailable()
                .body("No healthy backends available"),
            _ => HttpResponse::build(self.status_code()).body(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_backend_available_is_503() {
        let err = GatewayError::NoBackendAvailable { pool: "backend".into() };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn retries_exhausted_is_502() {
        let err = GatewayError::RetriesExhausted { hops: 3 };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn no_backend_body_matches_wire_contract() {
        let err = GatewayError::NoBackendAvailable { pool: "backend".into() };
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
