use anyhow::Context;
use clap::Parser; // for cli
use crate_digger::config::Args;
use crate_digger::rate_limit::sweeper;
use crate_digger::{AppState, build_router};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    let settings = args.settings();

    if settings.guest_access_ignored() {
        tracing::warn!("guest access is ignored outside development");
    }
    if settings.vision_api_key.is_none() {
        tracing::warn!("no vision API key configured, photo extraction is disabled");
    }

    // creating shared state
    let state = Arc::new(AppState::new(settings));

    // spawn the rate limit sweeper
    if args.sweep_interval > 0 {
        let gate = Arc::clone(&state.gate);
        let every = Duration::from_secs(args.sweep_interval);
        tokio::spawn(async move {
            sweeper(gate, every).await;
        });
    }

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(port = args.port, environment = ?args.environment, "crate-digger listening");
    tracing::info!(discogs = %args.discogs_url, vision = %args.vision_url, "upstream services");
    axum::serve(listener, app).await?;
    Ok(())
}
