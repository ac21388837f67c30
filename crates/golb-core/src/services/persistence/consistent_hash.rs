//! Consistent Hash persistence (§4.3): a CRC32 hash ring keyed on request path.
//!
//! `crc32fast` is grounded in the pack's `Borislavv-rs-adv-cache` manifest (`crc32fast = "1.3"`),
//! since the donor repository's weighted-list balancer has no ring structure to generalize.

use std::sync::Arc;

use crate::models::backend::Backend;
use crate::services::scheduler::Scheduler;

/// A sorted vector of `(hash, backend_index)` pairs, built once per pool and read without
/// synchronization thereafter (§5).
pub struct HashRing {
    entries: Vec<(u32, usize)>,
}

impl HashRing {
    pub fn build(backends: &[Arc<Backend>], replica_count: u32) -> Self {
        let mut entries = Vec::new();
        for (index, backend) in backends.iter().enumerate() {
            let url = backend.url();
            let vnodes = backend.weight.saturating_mul(replica_count);
            for replica in 0..vnodes {
                let key = format!("{}:{}", url, replica);
                entries.push((crc32fast::hash(key.as_bytes()), index));
            }
        }
        entries.sort_unstable_by_key(|&(hash, _)| hash);
        Self { entries }
    }

    /// First entry with `hash >= key_hash`, wrapping to index 0; then walks forward up to one
    /// full revolution to find an alive backend.
    pub fn lookup_alive(&self, key_hash: u32, backends: &[Arc<Backend>]) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let start = self.entries.partition_point(|&(hash, _)| hash < key_hash) % self.entries.len();
        let n = self.entries.len();
        for step in 0..n {
            let (_, index) = self.entries[(start + step) % n];
            if backends[index].is_alive() {
                return Some(index);
            }
        }
        None
    }
}

pub struct ConsistentHashPersistence {
    ring: HashRing,
}

impl ConsistentHashPersistence {
    pub fn new(backends: &[Arc<Backend>], replica_count: u32) -> Self {
        Self { ring: HashRing::build(backends, replica_count) }
    }

    pub fn choose(
        &self,
        path: &str,
        backends: &[Arc<Backend>],
        scheduler: &Scheduler,
    ) -> Option<usize> {
        if path.is_empty() {
            return scheduler.choose(backends);
        }
        let key_hash = crc32fast::hash(path.as_bytes());
        self.ring.lookup_alive(key_hash, backends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::backend::Scheme;
    use crate::services::scheduler::Algorithm;

    fn pool() -> Vec<Arc<Backend>> {
        (0..3)
            .map(|i| Arc::new(Backend::new(Scheme::Http, "h".into(), 8000 + i, String::new(), 1)))
            .collect()
    }

    #[test]
    fn same_path_always_selects_the_same_backend() {
        let backends = pool();
        let persistence = ConsistentHashPersistence::new(&backends, 100);
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        let first = persistence.choose("/products", &backends, &scheduler).unwrap();
        for _ in 0..5 {
            assert_eq!(persistence.choose("/products", &backends, &scheduler).unwrap(), first);
        }
    }

    #[test]
    fn distinct_paths_can_land_on_distinct_backends() {
        let backends = pool();
        let persistence = ConsistentHashPersistence::new(&backends, 100);
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        let mut seen = std::collections::HashSet::new();
        for path in ["/products", "/users", "/orders", "/cart", "/search"] {
            seen.insert(persistence.choose(path, &backends, &scheduler).unwrap());
        }
        assert!(seen.len() >= 2);
    }

    #[test]
    fn empty_path_delegates_to_base_scheduler() {
        let backends = pool();
        let persistence = ConsistentHashPersistence::new(&backends, 100);
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        assert!(persistence.choose("", &backends, &scheduler).is_some());
    }

    #[test]
    fn walks_forward_past_dead_backends() {
        let backends = pool();
        backends[0].force_dead_for_test();
        backends[1].force_dead_for_test();
        let persistence = ConsistentHashPersistence::new(&backends, 100);
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        assert_eq!(persistence.choose("/anything", &backends, &scheduler), Some(2));
    }
}
