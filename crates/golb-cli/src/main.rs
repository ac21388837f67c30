//! Command-line interface for the reverse-proxy load balancer.
//!
//! Mirrors the donor's `kairos-cli/src/main.rs` subcommand style, trimmed to the two
//! configuration-management subcommands this crate keeps (`config validate`, `config generate`);
//! the donor's `status`/`metrics` subcommands called an admin HTTP surface this crate does not
//! expose.

use clap::{Parser, Subcommand};
use golb_core::config::grammar;
use golb_core::config::loader::load_from_path;
use golb_core::config::validation::validate;
use golb_core::services::scheduler::Algorithm;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "golb", version, about = "Configuration tooling for the golb reverse-proxy load balancer")]
struct Cli {
    /// Overrides the configured scheduling algorithm when reporting validation results.
    #[arg(long, global = true, value_name = "ALGORITHM")]
    algorithm: Option<String>,

    /// Overrides the configured persistence policy when reporting validation results.
    #[arg(long, global = true, value_name = "POLICY")]
    persistence: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration file management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Parses and validates a configuration file, reporting every error and warning found.
    Validate {
        #[arg(short, long, value_name = "FILE", default_value = "golb.conf")]
        file: String,
    },
    /// Writes a minimal two-backend sample configuration to disk.
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "golb.conf")]
        output: String,
    },
}

const SAMPLE_CONFIG: &str = r#"upstream backend {
    server http://127.0.0.1:9001 weight=5
    server http://127.0.0.1:9002 weight=3
}

method weighted_round_robin
persistence cookie name=GOLB_SESSION ttl=3600

route path /api/ backend
default_backend backend
"#;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { action: ConfigAction::Validate { file } } => validate_command(&file, cli.algorithm, cli.persistence),
        Commands::Config { action: ConfigAction::Generate { output } } => generate_command(&output),
    }
}

fn validate_command(file: &str, algorithm: Option<String>, persistence: Option<String>) -> ExitCode {
    let parsed = match load_from_path(file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(algorithm) = &algorithm {
        if Algorithm::parse(algorithm).is_none() {
            eprintln!("error: unknown --algorithm '{}'", algorithm);
            return ExitCode::FAILURE;
        }
    }

    let result = validate(&parsed);
    for error in &result.errors {
        eprintln!("error: {}", error);
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }

    if !result.is_valid {
        return ExitCode::FAILURE;
    }

    let effective_method = algorithm.as_deref().or(parsed.method.as_deref()).unwrap_or("round_robin");
    let effective_persistence = persistence.as_deref().unwrap_or("none");
    println!(
        "configuration is valid: {} pool(s), method={}, persistence={}",
        parsed.upstreams.len(),
        effective_method,
        effective_persistence
    );
    ExitCode::SUCCESS
}

fn generate_command(output: &str) -> ExitCode {
    if let Err(e) = grammar::parse(SAMPLE_CONFIG) {
        eprintln!("error: built-in sample configuration does not parse: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = std::fs::write(output, SAMPLE_CONFIG) {
        eprintln!("error: cannot write '{}': {}", output, e);
        return ExitCode::FAILURE;
    }
    println!("wrote sample configuration to {}", output);
    ExitCode::SUCCESS
}
