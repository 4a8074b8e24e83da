//! Turnstile - session and token exchange service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnstile::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("turnstile={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Turnstile - session token exchange");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Field cipher: {}", args.field_cipher);
    info!(
        "Token lifetimes: access {}s, refresh {}s",
        args.access_token_ttl_secs, args.refresh_token_ttl_secs
    );
    info!("Key exchange handle TTL: {}s", args.ephemeral_key_ttl_secs);
    info!("======================================");

    let state = Arc::new(AppState::build(args).await?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
