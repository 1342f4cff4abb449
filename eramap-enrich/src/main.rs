//! eramap-enrich - Release-Year Enrichment
//!
//! Fills the missing release years of a track dataset by querying three
//! external catalogs (Spotify, MusicBrainz, Discogs) concurrently, one
//! rate-limited lane per catalog, with periodic guarded checkpoints and a
//! resumable cancellation path.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eramap_common::events::{EnrichEvent, EventBus};
use eramap_common::{config, store};
use eramap_enrich::filter::filter_outliers;
use eramap_enrich::{Enricher, RunOutcome};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eramap-enrich", about = "Enrich a track dataset with release years")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the enrichment engine (resumes from the checkpoint when present)
    Run {
        /// Base input dataset, overrides the configured path
        #[arg(long)]
        input: Option<PathBuf>,
        /// Resumable checkpoint path, overrides the configured path
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Final output path, overrides the configured path
        #[arg(long = "final-output")]
        final_output: Option<PathBuf>,
    },
    /// Filter duration/speechiness/instrumentalness outliers out of a dataset
    Filter {
        /// Input CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            input,
            checkpoint,
            final_output,
        } => {
            let base = input.unwrap_or_else(|| config.paths.base_dataset.clone());
            let checkpoint = checkpoint.unwrap_or_else(|| config.paths.checkpoint.clone());
            let final_output = final_output.unwrap_or_else(|| config.paths.final_output.clone());
            run_enrichment(&config, base, checkpoint, final_output).await
        }
        Command::Filter { input, output } => {
            let records = store::load_dataset(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;
            let (kept, summary) = filter_outliers(records);
            store::save_dataset(&output, &kept)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(
                input = summary.input,
                kept = summary.kept,
                output = %output.display(),
                "filtered dataset written"
            );
            Ok(())
        }
    }
}

async fn run_enrichment(
    config: &config::TomlConfig,
    base: PathBuf,
    checkpoint: PathBuf,
    final_output: PathBuf,
) -> Result<()> {
    // Resume from the checkpoint when a prior run left one; otherwise start
    // from the base input, whose rows have no year yet.
    let records = if checkpoint.exists() {
        info!(path = %checkpoint.display(), "resuming from checkpoint");
        store::load_dataset(&checkpoint)
            .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?
    } else {
        info!(path = %base.display(), "loading base dataset");
        store::load_dataset(&base)
            .with_context(|| format!("failed to load {}", base.display()))?
    };

    let events = EventBus::new(1024);
    let enricher = Enricher::from_config(records, config, events.clone())
        .context("failed to construct catalog clients")?;

    // Progress reporting off the event bus
    let progress = tokio::spawn(report_progress(events.subscribe()));

    // Ctrl-C sets the stop signal; the coordinator drains and checkpoints.
    let cancel = enricher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight lookups and saving");
            cancel.cancel();
        }
    });

    let report = enricher.run(&checkpoint, &final_output).await;
    progress.abort();

    match report {
        Ok(report) => {
            match report.outcome {
                RunOutcome::Completed => info!(
                    resolved = report.resolved,
                    unresolved = report.unresolved,
                    path = %report.saved_to.display(),
                    "enrichment complete, final dataset written"
                ),
                RunOutcome::Cancelled => info!(
                    resolved = report.resolved,
                    unresolved = report.unresolved,
                    path = %report.saved_to.display(),
                    "enrichment cancelled, progress checkpointed"
                ),
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "enrichment run failed");
            Err(e.into())
        }
    }
}

/// Log progress every `STEP` processed records, plus every autosave and
/// corruption event as it happens.
async fn report_progress(mut rx: tokio::sync::broadcast::Receiver<EnrichEvent>) {
    const STEP: usize = 100;

    let mut total_pending = 0usize;
    let mut processed = 0usize;

    loop {
        match rx.recv().await {
            Ok(EnrichEvent::RunStarted { total_pending: t, .. }) => {
                total_pending = t;
                info!(total_pending, "enrichment started");
            }
            Ok(EnrichEvent::RecordProcessed { .. }) => {
                processed += 1;
                if processed % STEP == 0 || processed == total_pending {
                    info!(processed, total_pending, "progress");
                }
            }
            Ok(EnrichEvent::Autosaved { resolved, path, .. }) => {
                info!(resolved, path, "checkpoint saved");
            }
            Ok(EnrichEvent::CorruptionDetected { expected, actual, .. }) => {
                error!(expected, actual, "dataset corrupted, run aborting");
            }
            Ok(EnrichEvent::Cancelled { .. }) => {
                info!("cancellation in progress");
            }
            Ok(EnrichEvent::RunCompleted { .. }) => break,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                processed += skipped as usize;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
