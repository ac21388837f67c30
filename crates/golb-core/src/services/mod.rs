//! Service layer: scheduling, persistence, proxying, stats, and composition.

pub mod factory;
pub mod persistence;
pub mod proxy;
pub mod scheduler;
pub mod stats;
pub mod websocket;
