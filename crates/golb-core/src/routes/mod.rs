//! HTTP route handlers wiring the dispatch engine into an actix-web service.
//!
//! [`health`] exposes the Kubernetes-style probe endpoints; [`http`] registers the single
//! catch-all route that drives the proxy engine (branching to [`websocket`] for upgrade
//! requests).

pub mod health;
pub mod http;
pub mod websocket;
