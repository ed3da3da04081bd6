//! `advisor` binary: wires configuration, upstream clients and the gateway
//! together and serves the HTTP/WebSocket surface.

mod cli;

use std::sync::Arc;

use clap::Parser;

use advisor_api::{start_server, AppState};
use advisor_chat::{
    Authenticator, ChatGateway, HttpResourceProxy, HttpUpstreamClient, TokenAuthenticator,
};
use advisor_core::AdvisorConfig;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        AdvisorConfig::load(&config_file)?
    } else {
        AdvisorConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Advisor gateway v{}", env!("CARGO_PKG_VERSION"));
    if config_file.exists() {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file, using defaults");
    }

    let upstream = Arc::new(HttpUpstreamClient::new(&config.upstream)?);
    tracing::info!(url = %upstream.base_url(), "Upstream AI service configured");

    let resources = Arc::new(HttpResourceProxy::new(
        &config.resources,
        &config.upstream.user_agent,
    )?);
    let authenticator = Arc::new(TokenAuthenticator::new(&config.auth));
    let gateway = ChatGateway::new(
        &config,
        upstream,
        Arc::clone(&authenticator) as Arc<dyn Authenticator>,
        resources,
    );

    let state = AppState::new(config.clone(), gateway, authenticator);
    start_server(&config, state).await?;

    tracing::info!("Advisor gateway shut down");
    Ok(())
}
