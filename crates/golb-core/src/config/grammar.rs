//! Directive grammar parser (§6).
//!
//! Line-oriented, case-sensitive. Blank lines and `#` comments are ignored. This is original to
//! this exercise — no single pack example uses this exact format — but the parse-then-validate
//! pipeline shape (raw tokens -> typed intermediate -> validated runtime config) mirrors the
//! `RawConfig -> RuntimeConfig` conversion used by `another-rust-load-balancer`'s
//! `configuration.rs` for its YAML input.

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDef {
    pub url: String,
    pub weight: u32,
    pub max_conn: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamDef {
    pub name: String,
    pub servers: Vec<ServerDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDef {
    PathPrefix { prefix: String, pool: String },
    PathRegex { pattern: String, pool: String },
    Header { name: String, value: String, pool: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CookieParams {
    pub name: Option<String>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceDef {
    None,
    Cookie(CookieParams),
    IpHash,
    ConsistentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedConfig {
    pub upstreams: Vec<UpstreamDef>,
    pub method: Option<String>,
    pub persistence: Option<PersistenceDef>,
    pub routes: Vec<RouteDef>,
    pub default_backend: Option<String>,
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Parses `key=value` trailer tokens shared by `server` and `persistence cookie`.
fn parse_kv(token: &str) -> Option<(&str, &str)> {
    token.split_once('=')
}

fn parse_server_line(tokens: &[&str]) -> Result<ServerDef, GatewayError> {
    let url = *tokens.get(1).ok_or_else(|| {
        GatewayError::ConfigurationError("server directive missing a URL".into())
    })?;
    let mut weight = 1u32;
    let mut max_conn = None;
    for token in &tokens[2..] {
        match parse_kv(token) {
            Some(("weight", v)) => {
                weight = v.parse().map_err(|_| {
                    GatewayError::ConfigurationError(format!("invalid weight '{}'", v))
                })?;
                if weight < 1 {
                    return Err(GatewayError::ConfigurationError(
                        "weight must be >= 1".into(),
                    ));
                }
            }
            Some(("max_conn", v)) => {
                max_conn = Some(v.parse().map_err(|_| {
                    GatewayError::ConfigurationError(format!("invalid max_conn '{}'", v))
                })?);
            }
            _ => {
                return Err(GatewayError::ConfigurationError(format!(
                    "unknown server attribute '{}'",
                    token
                )))
            }
        }
    }
    Ok(ServerDef { url: url.to_string(), weight, max_conn })
}

fn parse_persistence_line(tokens: &[&str]) -> Result<PersistenceDef, GatewayError> {
    match tokens.get(1).copied() {
        Some("none") => Ok(PersistenceDef::None),
        Some("ip_hash") => Ok(PersistenceDef::IpHash),
        Some("consistent_hash") => Ok(PersistenceDef::ConsistentHash),
        Some("cookie") => {
            let mut params = CookieParams::default();
            for token in &tokens[2..] {
                match parse_kv(token) {
                    Some(("name", v)) => params.name = Some(v.to_string()),
                    Some(("ttl", v)) => {
                        params.ttl_secs = Some(v.parse().map_err(|_| {
                            GatewayError::ConfigurationError(format!("invalid ttl '{}'", v))
                        })?)
                    }
                    _ => {
                        return Err(GatewayError::ConfigurationError(format!(
                            "unknown cookie attribute '{}'",
                            token
                        )))
                    }
                }
            }
            Ok(PersistenceDef::Cookie(params))
        }
        other => Err(GatewayError::ConfigurationError(format!(
            "unknown persistence policy '{:?}'",
            other
        ))),
    }
}

fn parse_route_line(tokens: &[&str]) -> Result<RouteDef, GatewayError> {
    match tokens.get(1).copied() {
        Some("path") => {
            let prefix = tokens.get(2).ok_or_else(route_arity_error)?;
            let pool = tokens.get(3).ok_or_else(route_arity_error)?;
            Ok(RouteDef::PathPrefix { prefix: prefix.to_string(), pool: pool.to_string() })
        }
        Some("regex") => {
            let pattern = tokens.get(2).ok_or_else(route_arity_error)?;
            let pool = tokens.get(3).ok_or_else(route_arity_error)?;
            Ok(RouteDef::PathRegex { pattern: pattern.to_string(), pool: pool.to_string() })
        }
        Some("header") => {
            let name = tokens.get(2).ok_or_else(route_arity_error)?;
            let value = tokens.get(3).ok_or_else(route_arity_error)?;
            let pool = tokens.get(4).ok_or_else(route_arity_error)?;
            Ok(RouteDef::Header { name: name.to_string(), value: value.to_string(), pool: pool.to_string() })
        }
        other => Err(GatewayError::ConfigurationError(format!(
            "unknown route kind '{:?}'",
            other
        ))),
    }
}

fn route_arity_error() -> GatewayError {
    GatewayError::ConfigurationError("route directive missing arguments".into())
}

/// Parses the full directive grammar. Does not validate cross-references (pool names, regex
/// compilation) — that happens in [`super::validation`] once the upstream set is known.
pub fn parse(input: &str) -> Result<ParsedConfig, GatewayError> {
    let mut config = ParsedConfig::default();
    let mut current_upstream: Option<UpstreamDef> = None;

    for raw_line in input.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(upstream) = current_upstream.as_mut() {
            if line == "}" {
                config.upstreams.push(current_upstream.take().unwrap());
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.first() != Some(&"server") {
                return Err(GatewayError::ConfigurationError(format!(
                    "unexpected directive '{}' inside upstream block",
                    line
                )));
            }
            upstream.servers.push(parse_server_line(&tokens)?);
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "upstream" => {
                let name = tokens.get(1).ok_or_else(|| {
                    GatewayError::ConfigurationError("upstream directive missing a name".into())
                })?;
                if tokens.get(2) != Some(&"{") {
                    return Err(GatewayError::ConfigurationError(
                        "upstream block must open with '{'".into(),
                    ));
                }
                current_upstream = Some(UpstreamDef { name: name.to_string(), servers: Vec::new() });
            }
            "method" => {
                let value = tokens.get(1).ok_or_else(|| {
                    GatewayError::ConfigurationError("method directive missing a value".into())
                })?;
                config.method = Some(value.to_string());
            }
            "persistence" => {
                config.persistence = Some(parse_persistence_line(&tokens)?);
            }
            "route" => {
                config.routes.push(parse_route_line(&tokens)?);
            }
            "default_backend" => {
                let value = tokens.get(1).ok_or_else(|| {
                    GatewayError::ConfigurationError("default_backend directive missing a value".into())
                })?;
                config.default_backend = Some(value.to_string());
            }
            other => {
                return Err(GatewayError::ConfigurationError(format!(
                    "unknown directive '{}'",
                    other
                )))
            }
        }
    }

    if current_upstream.is_some() {
        return Err(GatewayError::ConfigurationError(
            "unterminated upstream block (missing '}')".into(),
        ));
    }

    Ok(config)
}

/// Re-renders a [`ParsedConfig`] back into the directive grammar. Used to exercise the
/// round-trip property in §8 (`Parse(Serialize(config)) ≡ config`).
pub fn serialize(config: &ParsedConfig) -> String {
    let mut out = String::new();
    for upstream in &config.upstreams {
        out.push_str(&format!("upstream {} {{\n", upstream.name));
        for server in &upstream.servers {
            out.push_str(&format!("    server {} weight={}", server.url, server.weight));
            if let Some(max_conn) = server.max_conn {
                out.push_str(&format!(" max_conn={}", max_conn));
            }
            out.push('\n');
        }
        out.push_str("}\n");
    }
    if let Some(method) = &config.method {
        out.push_str(&format!("method {}\n", method));
    }
    match &config.persistence {
        Some(PersistenceDef::None) => out.push_str("persistence none\n"),
        Some(PersistenceDef::IpHash) => out.push_str("persistence ip_hash\n"),
        Some(PersistenceDef::ConsistentHash) => out.push_str("persistence consistent_hash\n"),
        Some(PersistenceDef::Cookie(params)) => {
            out.push_str("persistence cookie");
            if let Some(name) = &params.name {
                out.push_str(&format!(" name={}", name));
            }
            if let Some(ttl) = params.ttl_secs {
                out.push_str(&format!(" ttl={}", ttl));
            }
            out.push('\n');
        }
        None => {}
    }
    for route in &config.routes {
        match route {
            RouteDef::PathPrefix { prefix, pool } => {
                out.push_str(&format!("route path {} {}\n", prefix, pool))
            }
            RouteDef::PathRegex { pattern, pool } => {
                out.push_str(&format!("route regex {} {}\n", pattern, pool))
            }
            RouteDef::Header { name, value, pool } => {
                out.push_str(&format!("route header {} {} {}\n", name, value, pool))
            }
        }
    }
    if let Some(default_backend) = &config.default_backend {
        out.push_str(&format!("default_backend {}\n", default_backend));
    }
    out
}
