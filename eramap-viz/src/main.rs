//! eramap-viz - Genre/Era Analytics
//!
//! Consumes the enriched dataset and produces the genre/era analytics as
//! JSON: genre-cluster summaries, per-decade density layers with dominant
//! maps, and spline-interpolated frames between consecutive decades.

use anyhow::{Context, Result};
use clap::Parser;
use eramap_common::store;
use eramap_viz::kde::{self, DecadeLayers};
use eramap_viz::{interp, kmeans, preprocess, summary};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eramap-viz", about = "Genre/era analytics over an enriched track dataset")]
struct Cli {
    /// Enriched dataset CSV (output of eramap-enrich)
    input: PathBuf,

    /// Output directory for the analytics JSON
    #[arg(long, default_value = "analytics")]
    out_dir: PathBuf,

    /// Number of genre clusters
    #[arg(short, long, default_value_t = 7)]
    k: usize,

    /// Density grid resolution per axis
    #[arg(long, default_value_t = 100)]
    resolution: usize,

    /// Density cutoff as a fraction of each layer's peak
    #[arg(long, default_value_t = kde::DEFAULT_DENSITY_THRESHOLD)]
    threshold: f64,

    /// Interpolated frames between consecutive decades
    #[arg(long, default_value_t = 5)]
    frames: usize,

    /// Row cap for the density stages (seeded downsample)
    #[arg(long, default_value_t = 10_000)]
    sample_cap: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let records = store::load_dataset(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;
    info!(rows = records.len(), "dataset loaded");

    let mut rows = preprocess::preprocess(&records, Some(cli.sample_cap));
    let mapping = kmeans::assign_clusters(&mut rows, cli.k);

    fs::create_dir_all(&cli.out_dir)?;
    let kde_dir = cli.out_dir.join("kde");
    fs::create_dir_all(&kde_dir)?;

    write_json(&cli.out_dir.join("cluster_mapping.json"), &mapping)?;
    write_json(
        &cli.out_dir.join("genres_summary.json"),
        &summary::summarize(&rows),
    )?;

    // per-decade density layers and dominant maps
    let mut decades: Vec<i32> = rows.iter().map(|r| r.decade).collect();
    decades.sort_unstable();
    decades.dedup();

    let mut decade_layers: Vec<DecadeLayers> = Vec::new();
    for &decade in &decades {
        let layers = kde::compute_decade_layers(&rows, decade, cli.resolution, cli.threshold);
        write_json(&kde_dir.join(format!("decade_{}.json", decade)), &layers)?;
        write_json(
            &kde_dir.join(format!("decade_{}_dominant.json", decade)),
            &kde::dominant_map(&layers.layers, cli.resolution),
        )?;
        info!(decade, layers = layers.layers.len(), "decade density layers written");
        decade_layers.push(layers);
    }

    // interpolated frames between consecutive decades
    let frame_refs: Vec<_> = decade_layers.iter().map(|d| &d.layers).collect();
    for window in decades.windows(2) {
        let (d1, d2) = (window[0], window[1]);
        for step in 1..=cli.frames {
            let alpha = step as f64 / (cli.frames + 1) as f64;
            let target_year = (1.0 - alpha) * d1 as f64 + alpha * d2 as f64;

            let layers = interp::interpolate_layers(&frame_refs, &decades, target_year, cli.threshold);
            write_json(
                &kde_dir.join(format!("interpolated_{}_{}.json", d1, step)),
                &layers,
            )?;
            write_json(
                &kde_dir.join(format!("interpolated_{}_{}_dominant.json", d1, step)),
                &kde::dominant_map(&layers, cli.resolution),
            )?;
        }
        info!(from = d1, to = d2, frames = cli.frames, "interpolated frames written");
    }

    info!(out_dir = %cli.out_dir.display(), "analytics complete");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
