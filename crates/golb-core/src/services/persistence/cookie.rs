//! Cookie persistence (§4.3): a tamper-evident, MD5-fingerprinted session cookie.
//!
//! The fingerprint is plain MD5 of the backend URL, not an authenticated signature — the spec
//! preserves the source's behavior deliberately (§9). `md5` is grounded in the pack's manifests
//! (`harborgrid-justin-caddy`, `pks-os-neon`, `rohan-flutterint-neon` all depend on `md5 = "0.7"`)
//! since the donor repository has no MD5 dependency of its own.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::models::backend::Backend;
use crate::services::scheduler::Scheduler;

use super::DEFAULT_COOKIE_TTL_SECS;

/// Result of attempting to resolve an inbound cookie value to a backend index.
#[derive(Debug, PartialEq, Eq)]
pub enum CookieLookup {
    /// Cookie names an alive backend whose MD5 fingerprint matches.
    Valid(usize),
    /// Cookie parses but the MD5 fingerprint does not match the referenced backend's URL.
    Tampered,
    /// Cookie is absent, malformed, names an out-of-range index, or the backend is not alive.
    Absent,
}

pub fn fingerprint(backend_url: &str) -> String {
    format!("{:x}", md5::compute(backend_url.as_bytes()))
}

pub fn parse_cookie_value(value: &str) -> Option<(usize, &str)> {
    let (index_str, hash) = value.split_once(':')?;
    let index: usize = index_str.parse().ok()?;
    Some((index, hash))
}

pub fn classify(value: &str, backends: &[Arc<Backend>]) -> CookieLookup {
    let Some((index, hash)) = parse_cookie_value(value) else {
        return CookieLookup::Absent;
    };
    let Some(backend) = backends.get(index) else {
        return CookieLookup::Absent;
    };
    if fingerprint(&backend.url()) != hash {
        return CookieLookup::Tampered;
    }
    if backend.is_alive() {
        CookieLookup::Valid(index)
    } else {
        CookieLookup::Absent
    }
}

pub struct CookiePersistence {
    pub cookie_name: String,
    pub ttl: Duration,
}

impl CookiePersistence {
    pub fn new(cookie_name: impl Into<String>, ttl: Duration) -> Self {
        Self { cookie_name: cookie_name.into(), ttl }
    }

    pub fn with_defaults() -> Self {
        Self::new(super::DEFAULT_COOKIE_NAME, Duration::from_secs(DEFAULT_COOKIE_TTL_SECS))
    }

    /// Returns `(index, set_cookie)`. `set_cookie` is `Some(value)` exactly when a fresh
    /// selection was made and the response must carry a new session cookie.
    pub fn choose(
        &self,
        cookie_value: Option<&str>,
        backends: &[Arc<Backend>],
        scheduler: &Scheduler,
    ) -> Option<(usize, Option<String>)> {
        if let Some(raw) = cookie_value {
            match classify(raw, backends) {
                CookieLookup::Valid(index) => return Some((index, None)),
                CookieLookup::Tampered => debug!("tampered session cookie, falling through to scheduler"),
                CookieLookup::Absent => {}
            }
        }
        let index = scheduler.choose(backends)?;
        let value = format!("{}:{}", index, fingerprint(&backends[index].url()));
        Some((index, Some(value)))
    }
}
