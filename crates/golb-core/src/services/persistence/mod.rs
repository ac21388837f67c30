//! Persistence decorators (§4.3): optional sticky-session wrappers around a base [`Scheduler`].

mod consistent_hash;
mod cookie;
mod ip_hash;

use std::sync::Arc;

use crate::models::backend::Backend;
use crate::services::scheduler::Scheduler;

pub use consistent_hash::{ConsistentHashPersistence, HashRing};
pub use cookie::{CookieLookup, CookiePersistence};
pub use ip_hash::IpHashPersistence;

pub const DEFAULT_COOKIE_NAME: &str = "GOLB_SESSION";
pub const DEFAULT_COOKIE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REPLICA_COUNT: u32 = 100;

/// Everything a persistence policy might need to make or remember a sticky decision.
pub struct DispatchContext<'a> {
    pub cookie_value: Option<&'a str>,
    pub client_ip: Option<&'a str>,
    pub path: &'a str,
}

/// Outcome of a persistence-aware dispatch: the chosen backend index, and, for cookie
/// persistence, the cookie value to set on the response when the session was not already
/// pinned.
pub struct Selection {
    pub index: usize,
    pub set_cookie: Option<String>,
}

pub enum Persistence {
    None,
    Cookie(CookiePersistence),
    IpHash(IpHashPersistence),
    ConsistentHash(ConsistentHashPersistence),
}

impl Persistence {
    pub fn name(&self) -> &'static str {
        match self {
            Persistence::None => "none",
            Persistence::Cookie(_) => "cookie",
            Persistence::IpHash(_) => "ip_hash",
            Persistence::ConsistentHash(_) => "consistent_hash",
        }
    }

    pub fn choose(
        &self,
        ctx: &DispatchContext<'_>,
        backends: &[Arc<Backend>],
        scheduler: &Scheduler,
    ) -> Option<Selection> {
        match self {
            Persistence::None => scheduler
                .choose(backends)
                .map(|index| Selection { index, set_cookie: None }),
            Persistence::Cookie(policy) => {
                let (index, set_cookie) = policy.choose(ctx.cookie_value, backends, scheduler)?;
                Some(Selection { index, set_cookie })
            }
            Persistence::IpHash(policy) => policy
                .choose(ctx.client_ip, backends, scheduler)
                .map(|index| Selection { index, set_cookie: None }),
            Persistence::ConsistentHash(policy) => policy
                .choose(ctx.path, backends, scheduler)
                .map(|index| Selection { index, set_cookie: None }),
        }
    }
}
