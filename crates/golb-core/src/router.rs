//! Path Router (§3 RouteRule/RouterConfig, §4.4).
//!
//! Deliberately decoupled from actix: matching takes a plain path string and a header-lookup
//! closure so the routing decision is testable without building a real `HttpRequest`. This
//! simplifies the donor's `utils/route_matcher.rs` static/dynamic split (which exists to support
//! `{param}` capture groups this spec does not need) down to the three rule shapes §3 defines,
//! evaluated in declared order with first-match-wins.

use regex::Regex;

/// One routing rule. Rules are ordered; the first one that matches wins (§4.4).
pub enum RouteRule {
    PathPrefix { prefix: String, pool: String },
    PathRegex { pattern: String, regex: Regex, pool: String },
    Header { name: String, value: String, pool: String },
}

impl RouteRule {
    pub fn pool(&self) -> &str {
        match self {
            RouteRule::PathPrefix { pool, .. } => pool,
            RouteRule::PathRegex { pool, .. } => pool,
            RouteRule::Header { pool, .. } => pool,
        }
    }
}

/// Ordered rules plus a mandatory default pool (§3).
pub struct RouterConfig {
    pub rules: Vec<RouteRule>,
    pub default_pool: String,
}

impl RouterConfig {
    pub fn single_pool(pool: impl Into<String>) -> Self {
        Self { rules: Vec::new(), default_pool: pool.into() }
    }

    /// Returns the name of the pool this request should be dispatched to. `header_lookup` is
    /// called with a header name and should return its value (byte-exact comparisons are the
    /// caller's header casing convention; actix normalizes to lowercase names).
    pub fn match_pool<'a>(&'a self, path: &str, header_lookup: impl Fn(&str) -> Option<&'a str>) -> &'a str
    where
        Self: 'a,
    {
        for rule in &self.rules {
            let matched = match rule {
                RouteRule::PathPrefix { prefix, .. } => path.starts_with(prefix.as_str()),
                RouteRule::PathRegex { regex, .. } => regex.is_match(path),
                RouteRule::Header { name, value, .. } => {
                    header_lookup(name).is_some_and(|actual| actual == value)
                }
            };
            if matched {
                return rule.pool();
            }
        }
        &self.default_pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> RouterConfig {
        RouterConfig {
            rules: vec![
                RouteRule::PathPrefix { prefix: "/api/".into(), pool: "api_pool".into() },
                RouteRule::PathRegex {
                    pattern: "^/static/.*\\.png$".into(),
                    regex: Regex::new("^/static/.*\\.png$").unwrap(),
                    pool: "images".into(),
                },
                RouteRule::Header { name: "x-canary".into(), value: "true".into(), pool: "canary".into() },
            ],
            default_pool: "backend".into(),
        }
    }

    #[test]
    fn path_prefix_wins_in_declared_order() {
        let r = router();
        assert_eq!(r.match_pool("/api/users", |_| None), "api_pool");
    }

    #[test]
    fn regex_matches_full_path() {
        let r = router();
        assert_eq!(r.match_pool("/static/logo.png", |_| None), "images");
    }

    #[test]
    fn header_rule_matches_exact_value() {
        let r = router();
        assert_eq!(r.match_pool("/checkout", |name| if name == "x-canary" { Some("true") } else { None }), "canary");
    }

    #[test]
    fn no_match_falls_through_to_default() {
        let r = router();
        assert_eq!(r.match_pool("/unknown", |_| None), "backend");
    }

    #[test]
    fn first_rule_wins_even_if_a_later_rule_would_also_match() {
        let rules = vec![
            RouteRule::PathPrefix { prefix: "/".into(), pool: "catch_all".into() },
            RouteRule::PathPrefix { prefix: "/api/".into(), pool: "api_pool".into() },
        ];
        let r = RouterConfig { rules, default_pool: "backend".into() };
        assert_eq!(r.match_pool("/api/users", |_| None), "catch_all");
    }
}
