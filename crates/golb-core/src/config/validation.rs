//! Configuration validation: every problem reported in one pass.
//!
//! `ValidationResult` follows the donor's `config/validation.rs::ValidationResult` shape
//! (accumulate errors/warnings instead of failing on the first one) but checks the §6 grammar's
//! actual cross-references instead of the donor's JSON route model.

use std::collections::HashSet;

use regex::Regex;

use super::grammar::{ParsedConfig, RouteDef};
use crate::services::scheduler::Algorithm;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { is_valid: true, errors: Vec::new(), warnings: Vec::new() }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Validates a parsed configuration against §6's cross-reference rules: every `<pool_name>`
/// referenced by a route or the default must exist, every regex must compile, and `method` (if
/// present) must name a known scheduling algorithm.
pub fn validate(config: &ParsedConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    if config.upstreams.is_empty() {
        result.add_error("no upstream pools declared");
    }

    let pool_names: HashSet<&str> = config.upstreams.iter().map(|u| u.name.as_str()).collect();

    for upstream in &config.upstreams {
        if upstream.servers.is_empty() {
            result.add_error(format!("upstream '{}' declares no servers", upstream.name));
        }
        for server in &upstream.servers {
            if !(server.url.starts_with("http://") || server.url.starts_with("https://")) {
                result.add_error(format!(
                    "server '{}' in upstream '{}' must use http:// or https://",
                    server.url, upstream.name
                ));
            }
        }
    }

    if let Some(method) = &config.method {
        if Algorithm::parse(method).is_none() {
            result.add_error(format!("unknown scheduling method '{}'", method));
        }
    }

    for route in &config.routes {
        let pool = match route {
            RouteDef::PathPrefix { pool, .. } => pool,
            RouteDef::PathRegex { pattern, pool } => {
                if let Err(e) = Regex::new(pattern) {
                    result.add_error(format!("route regex '{}' does not compile: {}", pattern, e));
                }
                pool
            }
            RouteDef::Header { pool, .. } => pool,
        };
        if !pool_names.contains(pool.as_str()) {
            result.add_error(format!("route references undeclared pool '{}'", pool));
        }
    }

    let default_pool = config.default_backend.as_deref().unwrap_or("backend");
    if !pool_names.contains(default_pool) {
        if config.default_backend.is_some() {
            result.add_error(format!("default_backend references undeclared pool '{}'", default_pool));
        } else if !config.routes.is_empty() {
            result.add_error("default_backend is required when route directives are present".to_string());
        } else {
            result.add_error(format!(
                "no pool named '{}' and no default_backend declared",
                default_pool
            ));
        }
    }

    if !config.routes.is_empty() && config.default_backend.is_none() {
        result.add_warning(
            "route directives present without an explicit default_backend; falling back to pool 'backend'".to_string(),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::grammar::parse;

    #[test]
    fn valid_config_passes() {
        let config = parse(
            "upstream backend {\n  server http://h:80\n}\nmethod round_robin\n",
        )
        .unwrap();
        let result = validate(&config);
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[test]
    fn route_to_undeclared_pool_is_an_error() {
        let config = parse(
            "upstream backend {\n  server http://h:80\n}\nroute path /api/ ghost\ndefault_backend backend\n",
        )
        .unwrap();
        let result = validate(&config);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("ghost")));
    }

    #[test]
    fn bad_regex_is_an_error() {
        let config = parse(
            "upstream backend {\n  server http://h:80\n}\nroute regex ( backend\ndefault_backend backend\n",
        )
        .unwrap();
        let result = validate(&config);
        assert!(!result.is_valid);
    }

    #[test]
    fn unknown_method_is_an_error() {
        let config = parse(
            "upstream backend {\n  server http://h:80\n}\nmethod fastest_first\n",
        )
        .unwrap();
        let result = validate(&config);
        assert!(!result.is_valid);
    }

    #[test]
    fn default_backend_required_with_routes() {
        let config = parse(
            "upstream backend {\n  server http://h:80\n}\nroute path /api/ backend\n",
        )
        .unwrap();
        let result = validate(&config);
        assert!(!result.warnings.is_empty());
    }
}
