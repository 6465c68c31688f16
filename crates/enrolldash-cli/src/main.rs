//! enrolldash - terminal view of the enrollment dashboard feed.
//!
//! Shows cached dashboard data immediately, revalidates against the backend,
//! and optionally keeps polling. Every state change is printed as a short
//! summary or, with `--json`, as one JSON object per line.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use enrolldash_core::{Config, Dashboard, DashboardView, FileStorage, RefreshOutcome};

// ============================================================================
// Constants
// ============================================================================

/// Environment override for the backend base URL
const ENV_API_URL: &str = "ENROLLDASH_API_URL";

/// Environment override for the polling interval in seconds
const ENV_POLL_SECS: &str = "ENROLLDASH_POLL_SECS";

/// Maximum chart rows printed per series in the text summary
const MAX_CHART_ROWS: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "enrolldash", version, about = "Enrollment dashboard with cached, self-refreshing data")]
struct Cli {
    /// Backend base URL (overrides config and ENROLLDASH_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Poll every N seconds; 0 disables polling
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Exit after the first refresh settles
    #[arg(long)]
    once: bool,

    /// Print each state as a JSON line instead of a summary
    #[arg(long)]
    json: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "enrolldash.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(cli: &Cli) -> Config {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    if let Ok(url) = std::env::var(ENV_API_URL) {
        config.api_base_url = url;
    }
    if let Ok(secs) = std::env::var(ENV_POLL_SECS) {
        match secs.parse() {
            Ok(secs) => config.poll_interval_secs = secs,
            Err(e) => warn!(value = %secs, error = %e, "Ignoring invalid {}", ENV_POLL_SECS),
        }
    }

    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(secs) = cli.poll_secs {
        config.poll_interval_secs = secs;
    }
    if cli.once {
        config.poll_interval_secs = 0;
    }

    config
}

fn print_view(view: &DashboardView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(view)?);
        return Ok(());
    }

    let status = if view.loading {
        " [loading]"
    } else if view.refreshing {
        " [refreshing]"
    } else {
        ""
    };
    println!(
        "Students: {}  Programs: {}  Colleges: {}  (updated {}){}",
        view.stats.total_students,
        view.stats.total_programs,
        view.stats.total_colleges,
        view.last_updated_display(Utc::now()),
        status
    );

    for (title, rows) in [
        ("By program", &view.chart_data.by_program),
        ("By college", &view.chart_data.by_college),
    ] {
        if rows.is_empty() {
            continue;
        }
        println!("  {}:", title);
        for record in rows.iter().take(MAX_CHART_ROWS) {
            println!("    {:<10} {:<40} {:>6}", record.code, record.name, record.student_count);
        }
        if rows.len() > MAX_CHART_ROWS {
            println!("    ... {} more", rows.len() - MAX_CHART_ROWS);
        }
    }

    if !view.stats_error.is_empty() {
        println!("  ! Stats: {}", view.stats_error);
    }
    if !view.charts_error.is_empty() && view.charts_error != view.stats_error {
        println!("  ! Charts: {}", view.charts_error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_ref());
    info!("enrolldash starting");

    let config = load_config(&cli);
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let storage = Arc::new(FileStorage::new(cache_dir));

    let (mut dashboard, initial) =
        Dashboard::from_config(&config, storage, None).context("Failed to start dashboard")?;
    let mut updates = dashboard.subscribe();

    print_view(&dashboard.view(), cli.json)?;

    if cli.once {
        let outcome = initial.wait().await;
        print_view(&dashboard.view(), cli.json)?;
        dashboard.teardown();
        if let RefreshOutcome::Failed(message) = outcome {
            anyhow::bail!("Refresh failed: {}", message);
        }
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = DashboardView::from(&*updates.borrow_and_update());
                print_view(&view, cli.json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    dashboard.teardown();
    info!("enrolldash shutting down");
    Ok(())
}
