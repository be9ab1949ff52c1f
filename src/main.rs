mod cli;
mod config;
mod error;
mod geo;
mod logging;
mod race;
mod ui;
mod updater;
mod zoneinfo;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use config::TzsyncConfig;
use error::{RaceError, TzsyncError};
use geo::GeoClient;
use ui::RaceProgress;
use updater::{RetryConfig, Updater};
use zoneinfo::LocaltimeLink;

/// Conventional exit status after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let mut config = match TzsyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", TzsyncError::Config(format!("{err:#}")));
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut config);

    let cancel = CancellationToken::new();
    tokio::spawn(forward_ctrl_c(cancel.clone()));

    let progress = Arc::new(RaceProgress::start(config.services.len(), !cli.verbose));

    match run(&cli, &config, cancel, Arc::clone(&progress)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            progress.fail(&err);
            match err {
                TzsyncError::Race(RaceError::Cancelled) => ExitCode::from(EXIT_INTERRUPTED),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(
    cli: &Cli,
    config: &TzsyncConfig,
    cancel: CancellationToken,
    progress: Arc<RaceProgress>,
) -> Result<(), TzsyncError> {
    let client = GeoClient::new(config.connect_timeout(), config.request_timeout())
        .map_err(|err| TzsyncError::Config(format!("could not build HTTP client: {err}")))?;
    let sink = LocaltimeLink::new(&config.zoneinfo_dir, &config.localtime_path);

    let updater = Updater::new(Arc::new(client), config.services.clone(), sink)
        .with_deadline(config.deadline())
        .with_retry(RetryConfig {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
        })
        .with_cancellation(cancel)
        .with_observer(progress.clone());

    tracing::debug!(services = ?updater.services(), "starting race");

    let detected = updater
        .detect(|attempt, max, err, delay_ms| {
            progress.retry(attempt, max, &err.to_string(), delay_ms);
        })
        .await?;

    if cli.dry_run {
        progress.detected(&detected);
        return Ok(());
    }

    let applied = updater.apply(&detected)?;
    progress.complete(&detected, applied);
    Ok(())
}

async fn forward_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("interrupted, cancelling race");
            cancel.cancel();
        }
        Err(err) => tracing::warn!(error = %err, "Ctrl-C handler failed"),
    }
}
