use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use postfinder::app::open_store;
use postfinder::config::Settings;
use postfinder::db::models::ScanWindow;
use postfinder::db::repository::DocumentStore;
use postfinder::scan::markers::Marker;
use postfinder::scan::scanner::{MarkerScanner, ScanStrategy};

/// Find published posts that embed a reference block.
#[derive(Parser, Debug)]
#[command(name = "postfinder-cli", version, about)]
struct Cli {
    /// Configuration file (defaults to ./postfinder.toml when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ids of posts embedding the marker, one per line
    Search(SearchArgs),
}

#[derive(Args, Debug, Default)]
struct SearchArgs {
    /// First publication day to include (YYYY-MM-DD). Defaults to the configured window before today
    #[arg(long, value_name = "DATE")]
    date_after: Option<NaiveDate>,

    /// Last publication day to include (YYYY-MM-DD). Defaults to today (UTC)
    #[arg(long, value_name = "DATE")]
    date_before: Option<NaiveDate>,

    /// Detection strategy: pushdown or verification
    #[arg(long)]
    strategy: Option<ScanStrategy>,

    /// Candidates fetched per batch by the verification strategy
    #[arg(long)]
    batch_size: Option<u64>,

    /// Block name to look for instead of the configured marker
    #[arg(long)]
    marker: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only ids.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postfinder=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Search(args) => {
            let store = open_store(&settings.store).await?;
            let today = Utc::now().date_naive();
            let stdout = std::io::stdout();
            let stderr = std::io::stderr();
            run_search(
                store,
                &settings,
                &args,
                today,
                &mut stdout.lock(),
                &mut stderr.lock(),
            )
            .await?;
        }
    }

    Ok(())
}

/// Scan the window and print the matching ids. Nothing is written to `out`
/// unless the whole scan succeeds.
async fn run_search(
    store: Arc<dyn DocumentStore>,
    settings: &Settings,
    args: &SearchArgs,
    today: NaiveDate,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<usize> {
    let marker = match &args.marker {
        Some(name) => Marker::new(name)?,
        None => settings.marker()?,
    };
    let window = resolve_window(args, today, settings.scan.default_window_days);
    let strategy = args.strategy.unwrap_or(settings.scan.strategy);
    let batch_size = args.batch_size.unwrap_or(settings.scan.batch_size);

    tracing::debug!(
        marker = %marker,
        %strategy,
        batch_size,
        after = %window.after,
        before = %window.before,
        "Resolved scan parameters"
    );
    if window.is_empty() {
        tracing::warn!(
            after = %window.after,
            before = %window.before,
            "Window starts after it ends, no posts can match"
        );
    }

    writeln!(
        err,
        "Searching for posts with the {marker} block between {} and {} ({strategy})",
        window.after, window.before
    )?;

    let ids = MarkerScanner::new(store, strategy)
        .with_batch_size(batch_size)
        .scan(&window, &marker)
        .await
        .context("Scan failed")?;

    if ids.is_empty() {
        tracing::info!("Scan finished without matches");
        writeln!(err, "Warning: No posts found in the specified date range.")?;
        return Ok(0);
    }

    for id in &ids {
        writeln!(out, "{id}")?;
    }
    out.flush()?;

    Ok(ids.len())
}

/// Explicit dates win; otherwise the window is the configured number of days
/// up to today.
fn resolve_window(args: &SearchArgs, today: NaiveDate, default_days: u64) -> ScanWindow {
    let default = ScanWindow::last_days(default_days, today);
    ScanWindow::new(
        args.date_after.unwrap_or(default.after),
        args.date_before.unwrap_or(default.before),
    )
}
