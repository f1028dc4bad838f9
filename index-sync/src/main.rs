//! index-sync
//!
//! Runs one reconciliation pass from the Postgres source to the configured
//! search destination, then exits.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use index_sync::{Dependencies, DestinationKind, SyncConfig, SyncError};
use index_sync_pipeline::SyncReport;

#[derive(Parser)]
#[command(name = "index-sync")]
#[command(about = "Reconcile a search index with its Postgres source of truth", long_about = None)]
struct Cli {
    /// Enumerate and diff only; report the plan without writing
    #[arg(long)]
    dry_run: bool,

    /// Destination backend (overrides SYNC_DESTINATION)
    #[arg(long, value_parser = parse_destination)]
    destination: Option<DestinationKind>,
}

fn parse_destination(s: &str) -> Result<DestinationKind, String> {
    s.parse().map_err(|e: SyncError| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> Result<SyncReport, SyncError> {
    let mut config = SyncConfig::from_env(cli.destination)?;
    config.pipeline.dry_run = cli.dry_run;

    let deps = Dependencies::new(config).await?;

    tokio::select! {
        report = deps.orchestrator.run() => Ok(report?),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, closing source connection");
            deps.source.close().await;
            Err(SyncError::connection("interrupted before the run completed"))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    info!(dry_run = cli.dry_run, "Starting index-sync");

    match run(cli).await {
        Ok(report) => {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!(error = %e, "Failed to serialize report"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "index-sync failed");
            ExitCode::FAILURE
        }
    }
}
