//! CLI argument definitions for the `advisor` binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use advisor_core::AdvisorConfig;

/// Advisor: chat gateway between operators and the grid AI service.
#[derive(Parser, Debug)]
#[command(name = "advisor", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP/WebSocket listen port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Listen address.
    #[arg(short = 'b', long = "bind")]
    pub bind: Option<String>,

    /// Base URL of the upstream AI service.
    #[arg(short = 'u', long = "upstream-url")]
    pub upstream_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Priority: --config flag > ADVISOR_CONFIG env var > ./advisor.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ADVISOR_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("advisor.toml")
    }

    /// Priority: --port flag > ADVISOR_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("ADVISOR_PORT") {
            match val.parse::<u16>() {
                Ok(p) => return p,
                Err(_) => tracing::warn!(value = %val, "Ignoring invalid ADVISOR_PORT"),
            }
        }
        config_port
    }

    /// Priority: --upstream-url flag > ADVISOR_UPSTREAM_URL env var > config file value.
    pub fn resolve_upstream_url(&self, config_url: &str) -> String {
        if let Some(ref u) = self.upstream_url {
            return u.clone();
        }
        if let Ok(u) = std::env::var("ADVISOR_UPSTREAM_URL") {
            if !u.trim().is_empty() {
                return u;
            }
        }
        config_url.to_string()
    }

    /// Fold CLI and environment overrides into a loaded config.
    pub fn apply(&self, config: &mut AdvisorConfig) {
        config.server.port = self.resolve_port(config.server.port);
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        config.upstream.base_url = self.resolve_upstream_url(&config.upstream.base_url);
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}
