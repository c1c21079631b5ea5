//! bizdir-agg - Business Listing Aggregator
//!
//! Crawls UK business listings from Companies House, OpenStreetMap, Foursquare
//! and Yelp, merges them into one record per business, and writes the result
//! to SQLite and a JSON export.
//!
//! # Commands
//! - `run`: one crawl, then exit
//! - `schedule`: crawl daily and weekly until Ctrl+C / SIGTERM

use std::path::PathBuf;

use anyhow::{Context, Result};
use bizdir_agg::crawler::{sample_seed, Crawler};
use bizdir_agg::scheduler::{run_forever, Schedule};
use bizdir_common::config::{find_config_file, load_toml_config, resolve_root_folder, TomlConfig};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for bizdir-agg
#[derive(Parser, Debug)]
#[command(name = "bizdir-agg")]
#[command(about = "Business listing aggregator")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/bizdir/config.toml, then /etc/bizdir/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root folder for the database and JSON export
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    /// Ingest the hand-entered sample listing before crawling
    #[arg(long, global = true)]
    seed_sample: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl and exit
    Run,
    /// Run crawls on the configured schedule until stopped
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Subscriber first so config loading is logged; the filter is narrowed to
    // the configured level once the config is known, unless RUST_LOG is set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter_layer, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| default_filter(DEFAULT_LOG_LEVEL).into()),
    );
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match find_config_file(args.config.as_deref()) {
        Some(path) => load_toml_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    if !from_env {
        let level = default_filter(&config.logging.level);
        if let Err(e) = filter_handle.reload(tracing_subscriber::EnvFilter::new(&level)) {
            warn!("Failed to apply log level '{}': {}", config.logging.level, e);
        }
    }

    info!("Starting bizdir-agg v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let schedule_config = config.schedule.clone();
    let mut crawler = Crawler::new(config, &root_folder);
    if args.seed_sample {
        crawler = crawler.with_seeds(vec![sample_seed()]);
    }
    info!("Database: {}", crawler.database_path().display());
    info!("Export: {}", crawler.export_path().display());

    match args.command {
        Command::Run => {
            let report = crawler.run().await.context("Crawl failed")?;
            for summary in &report.summaries {
                info!(
                    provider = summary.provider,
                    ingested = summary.ingested,
                    rejected = summary.rejected,
                    skipped = summary.skipped,
                    "Provider summary"
                );
            }
            for failure in &report.failures {
                warn!(provider = %failure.provider, error = %failure.error, "Provider failed");
            }
            info!(
                records = report.records,
                exported = report.exported,
                "Crawl finished in {:.1}s",
                report.duration.as_secs_f64()
            );
        }
        Command::Schedule => {
            let schedule = Schedule::from_config(&schedule_config).context("Invalid schedule")?;
            info!(?schedule, "Scheduler started");
            run_forever(&crawler, &schedule, shutdown_signal()).await;
        }
    }

    Ok(())
}

/// Filter directive applying `level` to this workspace's crates
fn default_filter(level: &str) -> String {
    format!("bizdir_agg={0},bizdir_common={0}", level.trim())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_covers_both_crates() {
        assert_eq!(default_filter("debug"), "bizdir_agg=debug,bizdir_common=debug");
        assert_eq!(default_filter(" warn "), "bizdir_agg=warn,bizdir_common=warn");
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(tracing_subscriber::EnvFilter::try_new(default_filter(DEFAULT_LOG_LEVEL)).is_ok());
    }
}
