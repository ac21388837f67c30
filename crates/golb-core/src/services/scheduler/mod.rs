//! Scheduler strategies (§4.2).
//!
//! Three concrete strategies, composed as a tagged enum rather than a trait object hierarchy
//! (see DESIGN.md's resolution of the source's dispatch-interface open question): the capability
//! every variant offers is a single `choose(backends) -> Option<index>`.

mod least_connections;
mod round_robin;
mod weighted_round_robin;

use std::sync::Arc;

use crate::models::backend::Backend;

pub use least_connections::LeastConnectionsScheduler;
pub use round_robin::RoundRobinScheduler;
pub use weighted_round_robin::WeightedRoundRobinScheduler;

/// Scheduling algorithm selectable per §6's `method` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
}

impl Algorithm {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "round_robin" => Some(Algorithm::RoundRobin),
            "weighted_round_robin" => Some(Algorithm::WeightedRoundRobin),
            "least_connections" => Some(Algorithm::LeastConnections),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::LeastConnections => "least_connections",
        }
    }
}

/// A scheduler bound to one pool. Holds whatever per-pool state its algorithm needs (a counter,
/// a credit-update critical section, or nothing at all).
pub enum Scheduler {
    RoundRobin(RoundRobinScheduler),
    WeightedRoundRobin(WeightedRoundRobinScheduler),
    LeastConnections(LeastConnectionsScheduler),
}

impl Scheduler {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::RoundRobin => Scheduler::RoundRobin(RoundRobinScheduler::new()),
            Algorithm::WeightedRoundRobin => {
                Scheduler::WeightedRoundRobin(WeightedRoundRobinScheduler::new())
            }
            Algorithm::LeastConnections => {
                Scheduler::LeastConnections(LeastConnectionsScheduler::new())
            }
        }
    }

    /// Selects an alive backend index, or `None` if every backend is not-alive.
    pub fn choose(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        match self {
            Scheduler::RoundRobin(s) => s.choose(backends),
            Scheduler::WeightedRoundRobin(s) => s.choose(backends),
            Scheduler::LeastConnections(s) => s.choose(backends),
        }
    }
}
