//! Least Connections: pick the alive backend with the fewest in-flight requests.
//!
//! Ties prefer higher weight, then lowest index (§4.2). No per-pool state is needed: the
//! decision reads each backend's already-atomic `active_connections` counter.

use std::sync::Arc;

use crate::models::backend::Backend;

pub struct LeastConnectionsScheduler;

impl LeastConnectionsScheduler {
    pub fn new() -> Self {
        Self
    }

    pub fn choose(&self, backends: &[Arc<Backend>]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, backend) in backends.iter().enumerate() {
            if !backend.is_alive() {
                continue;
            }
            best = Some(match best {
                None => i,
                Some(best_idx) => {
                    let current = &backends[best_idx];
                    match backend.active_connections().cmp(&current.active_connections()) {
                        std::cmp::Ordering::Less => i,
                        std::cmp::Ordering::Greater => best_idx,
                        std::cmp::Ordering::Equal => {
                            if backend.weight > current.weight {
                                i
                            } else {
                                best_idx
                            }
                        }
                    }
                }
            });
        }
        best
    }
}

impl Default for LeastConnectionsScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::Scheme;

    fn backend(weight: u32) -> Arc<Backend> {
        Arc::new(Backend::new(Scheme::Http, "h".into(), 9000, String::new(), weight))
    }

    #[test]
    fn picks_fewest_active_connections() {
        let backends = vec![backend(1), backend(1), backend(1)];
        backends[0].inc_active_connections();
        backends[1].inc_active_connections();
        backends[1].inc_active_connections();
        let sched = LeastConnectionsScheduler::new();
        assert_eq!(sched.choose(&backends), Some(2));
    }

    #[test]
    fn ties_prefer_higher_weight_then_lowest_index() {
        let backends = vec![backend(1), backend(5), backend(5)];
        let sched = LeastConnectionsScheduler::new();
        assert_eq!(sched.choose(&backends), Some(1));
    }

    #[test]
    fn skips_dead_backends() {
        let backends = vec![backend(1), backend(1)];
        backends[0].inc_active_connections();
        backends[1].force_dead_for_test();
        let sched = LeastConnectionsScheduler::new();
        assert_eq!(sched.choose(&backends), Some(0));
    }
}
