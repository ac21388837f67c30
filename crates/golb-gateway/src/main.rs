//! golb reverse-proxy load balancer server binary.
//!
//! Loads and validates the directive configuration, builds the dispatch engine, and serves it
//! behind actix-web. Bootstrap shape (logger first, then config, then server with `Logger` and
//! `Compress` middleware, then a Ctrl+C graceful shutdown race) mirrors the donor's
//! `kairos-gateway/src/main.rs`, with the JWT/AI/rate-limit/DNS/FTP wiring dropped since this
//! crate only implements the reverse-proxy load balancer surface.

use actix_web::{middleware::Compress, middleware::Logger, web, App, HttpServer};
use golb_core::config::grammar::PersistenceDef;
use golb_core::config::load_and_validate;
use golb_core::logs::logger::configure_logger;
use golb_core::routes::{health, http};
use golb_core::services::factory::Golb;
use golb_core::services::proxy::ProxyEngine;
use golb_core::services::scheduler::Algorithm;
use golb_core::services::websocket::WebSocketRegistry;
use log::{error, info};

/// Parses the `GOLB_PERSISTENCE` override. Only the parameterless policies are expressible this
/// way; `cookie` with custom name/ttl still requires the `persistence cookie ...` directive.
fn parse_persistence_override(value: &str) -> Option<PersistenceDef> {
    match value {
        "none" => Some(PersistenceDef::None),
        "cookie" => Some(PersistenceDef::Cookie(Default::default())),
        "ip_hash" => Some(PersistenceDef::IpHash),
        "consistent_hash" => Some(PersistenceDef::ConsistentHash),
        _ => None,
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let config_path = std::env::var("GOLB_CONFIG_PATH").unwrap_or_else(|_| "golb.conf".to_string());
    let (parsed, validation) = load_and_validate(&config_path).unwrap_or_else(|e| {
        error!("failed to load configuration from '{}': {}", config_path, e);
        std::process::exit(1);
    });
    for warning in &validation.warnings {
        log::warn!("{}", warning);
    }

    let algorithm_override = std::env::var("GOLB_ALGORITHM").ok().and_then(|v| Algorithm::parse(&v));
    let persistence_override =
        std::env::var("GOLB_PERSISTENCE").ok().and_then(|v| parse_persistence_override(&v));

    let golb = Golb::from_config(&parsed, algorithm_override, persistence_override).unwrap_or_else(|e| {
        error!("failed to build dispatch engine: {}", e);
        std::process::exit(1);
    });
    info!(
        "loaded {} pool(s), method={}, persistence={}",
        golb.pools.len(),
        golb.stats.algorithm(),
        golb.stats.persistence()
    );

    let golb = web::Data::new(golb);
    let proxy = web::Data::new(ProxyEngine::new());
    let registry = web::Data::new(WebSocketRegistry::new());

    let host = std::env::var("GOLB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("GOLB_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    info!("starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(golb.clone())
            .app_data(proxy.clone())
            .app_data(registry.clone())
            .wrap(Logger::default())
            .wrap(Compress::default())
            .configure(health::configure_health)
            .configure(http::configure_dispatch)
    })
    .bind((host.as_str(), port))?
    .run();

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("server stopped gracefully"),
                Err(e) => error!("server error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
