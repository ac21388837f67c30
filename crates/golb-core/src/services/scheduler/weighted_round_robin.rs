//! Weighted Round Robin: smooth, credit-based selection (§4.2).
//!
//! Unlike the donor's `WeightedBalancer` (which expands weights into a flat list of size `Sigma
//! weight[i]` and walks it), this is the smooth-weighted algorithm the spec requires: every
//! dispatch adds each alive backend's weight to its running credit, picks the largest credit
//! (lowest index breaks ties), and subtracts the total weight from the winner. Over `W`
//! dispatches every backend is picked exactly `weight[i]` times and no backend is ever starved
//! for more than one round.

use std::sync::{Arc, Mutex};

use crate::models::backend::Backend;

pub struct WeightedRoundRobinScheduler {
    // Serializes the read-modify-write sequence across all backends' credits so concurrent
    // dispatches cannot both observe the same pre-update credit and pick the same backend twice.
    critical_section: Mutex<()>,
}

impl WeightedRoundRobinScheduler {
    pub fn new() -> Self {
        Self { critical_section: Mutex::new(()) }
    }

    pub fn choose(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        let _guard = self.critical_section.lock().unwrap_or_else(|e| e.into_inner());

        let mut total_weight: i64 = 0;
        let mut winner: Option<(usize, i64)> = None;
        for (i, backend) in backends.iter().enumerate() {
            if !backend.is_alive() {
                continue;
            }
            total_weight += backend.weight as i64;
            let credit = backend.add_credit(backend.weight as i64);
            if winner.map_or(true, |(_, best_credit)| credit > best_credit) {
                winner = Some((i, credit));
            }
        }
        if total_weight == 0 {
            return None;
        }

        let (winner_idx, _) = winner?;
        backends[winner_idx].sub_credit(total_weight);
        Some(winner_idx)
    }
}

impl Default for WeightedRoundRobinScheduler {
    fn default() -> Self {
        Self::new()
    }
}
