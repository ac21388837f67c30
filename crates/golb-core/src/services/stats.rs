//! Statistics / counters (§4.6): process-global observability state.
//!
//! Per-backend counters already live on [`Backend`](crate::models::backend::Backend) as atomics;
//! this module only adds the process-wide figures the donor's `routes/metrics.rs` exposed through
//! a dedicated admin surface. That surface is out of scope here (§1), so `Stats` is a plain,
//! lock-free struct the embedding can snapshot for a `/health`-style endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::models::backend::Backend;

/// Process-global counters, incremented on the dispatch hot path without any lock.
pub struct Stats {
    total_requests: AtomicU64,
    start_time: Instant,
    algorithm: &'static str,
    persistence: &'static str,
    route_patterns: Vec<String>,
}

impl Stats {
    pub fn new(algorithm: &'static str, persistence: &'static str, route_patterns: Vec<String>) -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            start_time: Instant::now(),
            algorithm,
            persistence,
            route_patterns,
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    pub fn persistence(&self) -> &'static str {
        self.persistence
    }

    pub fn route_patterns(&self) -> &[String] {
        &self.route_patterns
    }
}

/// Read-only snapshot of one backend's counters, suitable for serializing to an external surface.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    pub url: String,
    pub weight: u32,
    pub alive: bool,
    pub error_count: u32,
    pub active_connections: u64,
    pub request_count: u64,
}

impl BackendSnapshot {
    pub fn of(backend: &Backend) -> Self {
        Self {
            url: backend.url(),
            weight: backend.weight,
            alive: backend.is_alive(),
            error_count: backend.error_count(),
            active_connections: backend.active_connections(),
            request_count: backend.request_count(),
        }
    }
}
