//! Composition / Factory (§4.7): turns a validated configuration into a runnable dispatch engine.
//!
//! Builds, per pool: one scheduler (by the global `method`), one persistence decorator instance
//! (by the global `persistence` policy — each pool gets its own hash ring / sticky map, per
//! §4.4's "each pool has its own... persistence decorator"), and folds all pools under a single
//! [`RouterConfig`]. This is the `LoadBalancerFactory`-style composition the donor's
//! `services/load_balancer.rs` used for its three strategies, generalized to also wrap
//! persistence and routing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::grammar::{ParsedConfig, PersistenceDef, RouteDef};
use crate::error::GatewayError;
use crate::models::backend::{Backend, Scheme};
use crate::router::{RouteRule, RouterConfig};
use crate::services::persistence::{
    ConsistentHashPersistence, CookiePersistence, IpHashPersistence, Persistence,
    DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_TTL_SECS, DEFAULT_REPLICA_COUNT,
};
use crate::services::scheduler::{Algorithm, Scheduler};
use crate::services::stats::Stats;

/// One pool's runtime state: its backends, bound scheduler, and bound persistence decorator.
pub struct Pool {
    pub backends: Vec<Arc<Backend>>,
    pub scheduler: Scheduler,
    pub persistence: Persistence,
}

/// The fully composed dispatch engine: every pool, the router over them, and process-global
/// stats. Built once at startup by [`Golb::from_config`] and shared (via `Arc`) across worker
/// threads for the process lifetime.
pub struct Golb {
    pub pools: HashMap<String, Pool>,
    pub router: RouterConfig,
    pub stats: Stats,
    pub failure_threshold: u32,
    pub revival_delay: Duration,
}

fn parse_backend_url(url: &str) -> Result<(Scheme, String, u16), GatewayError> {
    let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
        (Scheme::Https, rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        (Scheme::Http, rest)
    } else {
        return Err(GatewayError::ConfigurationError(format!(
            "server url '{}' must start with http:// or https://",
            url
        )));
    };
    let (authority, _path) = rest.split_once('/').unwrap_or((rest, ""));
    let (host, port_str) = authority.rsplit_once(':').ok_or_else(|| {
        GatewayError::ConfigurationError(format!("server url '{}' is missing a port", url))
    })?;
    let port: u16 = port_str.parse().map_err(|_| {
        GatewayError::ConfigurationError(format!("server url '{}' has an invalid port", url))
    })?;
    Ok((scheme, host.to_string(), port))
}

impl Golb {
    /// Builds the engine from a parsed configuration (assumed already validated — see
    /// [`crate::config::validation::validate`]). `algorithm_override` / `persistence_override`
    /// implement the CLI's §6 override flags, taking priority over the config file's directives.
    pub fn from_config(
        config: &ParsedConfig,
        algorithm_override: Option<Algorithm>,
        persistence_override: Option<PersistenceDef>,
    ) -> Result<Self, GatewayError> {
        let algorithm = algorithm_override
            .or_else(|| config.method.as_deref().and_then(Algorithm::parse))
            .unwrap_or(Algorithm::RoundRobin);

        let persistence_def = persistence_override
            .or_else(|| config.persistence.clone())
            .unwrap_or(PersistenceDef::None);

        let mut pools = HashMap::new();
        for upstream in &config.upstreams {
            let backends: Vec<Arc<Backend>> = upstream
                .servers
                .iter()
                .map(|server| {
                    let (scheme, host, port) = parse_backend_url(&server.url)?;
                    Ok(Arc::new(Backend::new(scheme, host, port, String::new(), server.weight)))
                })
                .collect::<Result<_, GatewayError>>()?;

            let scheduler = Scheduler::new(algorithm);
            let persistence = build_persistence(&persistence_def, &backends);

            pools.insert(upstream.name.clone(), Pool { backends, scheduler, persistence });
        }

        let default_pool = config.default_backend.clone().unwrap_or_else(|| "backend".to_string());
        if !pools.contains_key(&default_pool) {
            return Err(GatewayError::ConfigurationError(format!(
                "default pool '{}' is not declared",
                default_pool
            )));
        }

        let mut rules = Vec::with_capacity(config.routes.len());
        let mut route_patterns = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            rules.push(build_rule(route)?);
            route_patterns.push(route_pattern_label(route));
        }

        let router = RouterConfig { rules, default_pool };
        let stats = Stats::new(algorithm.as_str(), persistence_name(&persistence_def), route_patterns);

        Ok(Self {
            pools,
            router,
            stats,
            failure_threshold: crate::models::backend::DEFAULT_FAILURE_THRESHOLD,
            revival_delay: crate::models::backend::DEFAULT_REVIVAL_DELAY,
        })
    }

    pub fn pool(&self, name: &str) -> Option<&Pool> {
        self.pools.get(name)
    }
}

fn persistence_name(def: &PersistenceDef) -> &'static str {
    match def {
        PersistenceDef::None => "none",
        PersistenceDef::Cookie(_) => "cookie",
        PersistenceDef::IpHash => "ip_hash",
        PersistenceDef::ConsistentHash => "consistent_hash",
    }
}

fn build_persistence(def: &PersistenceDef, backends: &[Arc<Backend>]) -> Persistence {
    match def {
        PersistenceDef::None => Persistence::None,
        PersistenceDef::Cookie(params) => {
            let name = params.name.clone().unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());
            let ttl = Duration::from_secs(params.ttl_secs.unwrap_or(DEFAULT_COOKIE_TTL_SECS));
            Persistence::Cookie(CookiePersistence::new(name, ttl))
        }
        PersistenceDef::IpHash => Persistence::IpHash(IpHashPersistence::new()),
        PersistenceDef::ConsistentHash => {
            Persistence::ConsistentHash(ConsistentHashPersistence::new(backends, DEFAULT_REPLICA_COUNT))
        }
    }
}

fn build_rule(route: &RouteDef) -> Result<RouteRule, GatewayError> {
    Ok(match route {
        RouteDef::PathPrefix { prefix, pool } => {
            RouteRule::PathPrefix { prefix: prefix.clone(), pool: pool.clone() }
        }
        RouteDef::PathRegex { pattern, pool } => {
            let regex = regex::Regex::new(pattern).map_err(|e| {
                GatewayError::ConfigurationError(format!("route regex '{}' does not compile: {}", pattern, e))
            })?;
            RouteRule::PathRegex { pattern: pattern.clone(), regex, pool: pool.clone() }
        }
        RouteDef::Header { name, value, pool } => {
            RouteRule::Header { name: name.clone(), value: value.clone(), pool: pool.clone() }
        }
    })
}

fn route_pattern_label(route: &RouteDef) -> String {
    match route {
        RouteDef::PathPrefix { prefix, .. } => format!("path:{}", prefix),
        RouteDef::PathRegex { pattern, .. } => format!("regex:{}", pattern),
        RouteDef::Header { name, value, .. } => format!("header:{}={}", name, value),
    }
}
