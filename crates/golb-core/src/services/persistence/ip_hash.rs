//! IP Hash persistence (§4.3): pin a client IP to whichever backend first served it.
//!
//! Grounded in the donor's `IpHashBalancer` (`services/load_balancer.rs`), which hashes the
//! client IP with `DefaultHasher` to pick a backend directly; this spec instead *remembers* the
//! first scheduler decision per IP in a map, since the stickiness contract requires the same
//! backend to keep being chosen even as the base scheduler's internal state moves on.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::backend::Backend;
use crate::services::scheduler::Scheduler;

pub struct IpHashPersistence {
    // The map is never evicted by the core (§9); an embedder wanting an LRU bound would wrap
    // this type rather than modify it.
    sticky: RwLock<HashMap<String, usize>>,
}

impl IpHashPersistence {
    pub fn new() -> Self {
        Self { sticky: RwLock::new(HashMap::new()) }
    }

    pub fn choose(
        &self,
        client_ip: Option<&str>,
        backends: &[Arc<Backend>],
        scheduler: &Scheduler,
    ) -> Option<usize> {
        let Some(ip) = client_ip else {
            return scheduler.choose(backends);
        };

        if let Some(&index) = self.sticky.read().unwrap_or_else(|e| e.into_inner()).get(ip) {
            if backends.get(index).is_some_and(|b| b.is_alive()) {
                return Some(index);
            }
        }

        let index = scheduler.choose(backends)?;
        self.sticky
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(ip.to_string(), index);
        Some(index)
    }
}

impl Default for IpHashPersistence {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the client IP per §4.3: first comma-separated token of `X-Forwarded-For`, else the
/// transport peer address.
pub fn extract_client_ip(forwarded_for: Option<&str>, peer_addr: Option<&str>) -> Option<String> {
    if let Some(header) = forwarded_for {
        if let Some(first) = header.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    peer_addr.map(|s| s.to_string())
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
    fn same_ip_sticks_to_the_same_backend() {
        let backends = pool();
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        let persistence = IpHashPersistence::new();
        let first = persistence.choose(Some("10.0.0.5"), &backends, &scheduler).unwrap();
        for _ in 0..9 {
            let idx = persistence.choose(Some("10.0.0.5"), &backends, &scheduler).unwrap();
            assert_eq!(idx, first);
        }
    }

    #[test]
    fn distinct_ips_can_land_on_distinct_backends() {
        let backends = pool();
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        let persistence = IpHashPersistence::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..10 {
            let ip = format!("10.0.0.{}", i);
            seen.insert(persistence.choose(Some(&ip), &backends, &scheduler).unwrap());
        }
        assert!(seen.len() >= 2);
    }

    #[test]
    fn absent_ip_delegates_without_remembering() {
        let backends = pool();
        let scheduler = Scheduler::new(Algorithm::RoundRobin);
        let persistence = IpHashPersistence::new();
        persistence.choose(None, &backends, &scheduler).unwrap();
        assert!(persistence.sticky.read().unwrap().is_empty());
    }

    #[test]
    fn forwarded_for_first_token_wins() {
        assert_eq!(
            extract_client_ip(Some("1.2.3.4, 5.6.7.8"), Some("9.9.9.9")),
            Some("1.2.3.4".to_string())
        );
        assert_eq!(extract_client_ip(None, Some("9.9.9.9")), Some("9.9.9.9".to_string()));
    }
}
