//! Core dispatch engine for a reverse-proxy load balancer.
//!
//! A request flows `Router -> Scheduler -> Persistence -> Proxy Engine -> Health Accountant`.
//! This crate implements every stage of that pipeline; the embedding binary (`golb-gateway`) only
//! wires an HTTP server around [`factory`].

pub mod config;
pub mod error;
pub mod logs;
pub mod models;
pub mod router;
pub mod routes;
pub mod services;

pub use error::GatewayError;
pub use models::backend::{Backend, BackendPool};
pub use router::{RouteRule, RouterConfig};
pub use services::factory::Golb;
pub use services::stats::Stats;
