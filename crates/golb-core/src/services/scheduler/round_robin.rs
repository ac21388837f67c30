//! Round Robin: a single monotonic counter modulo `n`, ignoring weight entirely.
//!
//! Deliberately NOT built on top of weighted round robin (see the donor source's mid-refactor
//! fallback, and the Open Question resolution in DESIGN.md): RR is its own strategy so that the
//! equal-weight distribution test asserts the counter's transient behavior, not WRR's credit
//! accounting landing on the same steady-state ratio by coincidence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::backend::Backend;

pub struct RoundRobinScheduler {
    counter: AtomicUsize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self { counter: AtomicUsize::new(0) }
    }

    pub fn choose(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        let n = backends.len();
        if n == 0 {
            return None;
        }
        let start = self.counter.fetch_add(1, Ordering::Relaxed) % n;
        for step in 0..n {
            let idx = (start + step) % n;
            if backends[idx].is_alive() {
                return Some(idx);
            }
        }
        None
    }
}

impl Default for RoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}
