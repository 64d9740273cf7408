use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use postfinder::app::{open_store, router, AppState};
use postfinder::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "postfinder", version, about = "Post search and reference rendering API")]
struct Args {
    /// Configuration file (defaults to ./postfinder.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postfinder=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing::info!("Starting postfinder server...");

    let store = open_store(&settings.store).await?;
    let state = AppState::new(store, settings.permalinks()?, settings.search.default_per_page);
    let app = router(state);

    let addr = &settings.server.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
