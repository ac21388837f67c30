//! Backend identity, mutable runtime state, and the passive health accountant.
//!
//! A [`Backend`] is an immutable identity (scheme/host/port/path prefix) plus atomic mutable
//! state. All counters are lock-free scalars so the dispatch hot path never blocks on them. Health
//! transitions are driven entirely by observed proxy failures (no active probing) and revival is
//! a one-shot timer per transition, matching the donor's `CircuitBreaker` shape
//! (`services/circuit_breaker.rs`) generalized to the simpler `Alive -> Draining -> Revived ->
//! Alive` state machine this spec calls for.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

/// URL scheme a backend is addressed with. TLS termination is out of scope; `Https` only affects
/// how the outbound proxy URL is built, not how the listener accepts connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn ws_scheme(self) -> &'static str {
        match self {
            Scheme::Http => "ws",
            Scheme::Https => "wss",
        }
    }
}

/// Default consecutive-failure threshold before a backend is marked not-alive (§4.1).
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default one-shot revival delay (§4.1).
pub const DEFAULT_REVIVAL_DELAY: Duration = Duration::from_secs(10);

/// A single origin server: immutable identity plus atomic mutable state.
#[derive(Debug)]
pub struct Backend {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path_prefix: String,
    pub weight: u32,

    alive: AtomicBool,
    error_count: AtomicU32,
    active_connections: AtomicU64,
    current_credit: AtomicI64,
    request_count: AtomicU64,
    revival_pending: AtomicBool,
}

impl Backend {
    pub fn new(scheme: Scheme, host: String, port: u16, path_prefix: String, weight: u32) -> Self {
        Self {
            scheme,
            host,
            port,
            path_prefix,
            weight: weight.max(1),
            alive: AtomicBool::new(true),
            error_count: AtomicU32::new(0),
            active_connections: AtomicU64::new(0),
            current_credit: AtomicI64::new(0),
            request_count: AtomicU64::new(0),
            revival_pending: AtomicBool::new(false),
        }
    }

    /// The identity this backend is addressed by, e.g. `http://10.0.0.1:8080/v2`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme.as_str(), self.host, self.port, self.path_prefix)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn credit(&self) -> i64 {
        self.current_credit.load(Ordering::Relaxed)
    }

    pub fn add_credit(&self, delta: i64) -> i64 {
        self.current_credit.fetch_add(delta, Ordering::Relaxed) + delta
    }

    pub fn sub_credit(&self, delta: i64) {
        self.current_credit.fetch_sub(delta, Ordering::Relaxed);
    }

    /// Called at dispatch, before the proxy engine returns control for this request.
    pub fn inc_active_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Called exactly once per dispatch, on completion or error.
    pub fn dec_active_connections(&self) {
        let prev = self.active_connections.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "active_connections underflow");
    }

    /// Records a successful response. No health mutation per §4.1.
    pub fn record_success(&self) {}

    /// Records a proxy-level failure against this backend, running the §4.1 state machine.
    /// Spawns a one-shot revival task (guarded so at most one is ever pending) when the
    /// failure count crosses `threshold` while the backend is currently alive.
    pub fn record_failure(self: &Arc<Self>, threshold: u32, revival_delay: Duration) {
        let count = self.error_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count < threshold {
            return;
        }
        if self
            .alive
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(
                "backend {} marked not-alive after {} consecutive failures",
                self.url(),
                count
            );
            self.schedule_revival(revival_delay);
        }
    }

    fn schedule_revival(self: &Arc<Self>, delay: Duration) {
        if self
            .revival_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let backend = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            backend.error_count.store(0, Ordering::Release);
            backend.alive.store(true, Ordering::Release);
            backend.revival_pending.store(false, Ordering::Release);
            info!("backend {} revived", backend.url());
        });
    }

    #[cfg(test)]
    pub(crate) fn force_dead_for_test(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// A named, ordered set of backends sharing a scheduler and persistence policy.
#[derive(Debug)]
pub struct BackendPool {
    pub name: String,
    pub backends: Vec<Arc<Backend>>,
}

impl BackendPool {
    pub fn new(name: impl Into<String>, backends: Vec<Arc<Backend>>) -> Self {
        Self { name: name.into(), backends }
    }

    pub fn total_weight(&self) -> u32 {
        self.backends.iter().map(|b| b.weight).sum()
    }
}
