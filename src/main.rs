//! `hazepair` CLI - Inspect a paired hazy/clean image dataset.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hazepair::dataset::{DEFAULT_CROP, DEFAULT_RESIZE};
use hazepair::image::save_image;
use hazepair::{DatasetConfig, Mode, PairedImageDataset};

/// Check that every pair in a dataset loads, or preview one preprocessed pair.
#[derive(Parser, Debug)]
#[command(name = "hazepair")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base data directory.
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Sub-directory holding `GT/` and `hazy/`.
    #[arg(value_name = "SUB_DIR")]
    sub_dir: String,

    /// Dataset phase: train, valid or test.
    #[arg(short, long, default_value = "test", value_name = "MODE")]
    mode: Mode,

    /// Square resize edge for train and valid.
    #[arg(long, default_value_t = DEFAULT_RESIZE, value_name = "INT")]
    resize: u32,

    /// Center-crop edge for valid.
    #[arg(long, default_value_t = DEFAULT_CROP, value_name = "INT")]
    crop: u32,

    /// Random seed for flip decisions.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Write the preprocessed pair at this index instead of checking all pairs.
    #[arg(long, value_name = "INDEX")]
    preview: Option<usize>,

    /// Output directory for --preview.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    out: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hazepair={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when some pairs failed to load.
fn run(args: &Args) -> Result<bool> {
    let config = DatasetConfig {
        data_dir: args.data_dir.clone(),
        sub_dir: args.sub_dir.clone(),
        mode: args.mode,
        resize: args.resize,
        crop: args.crop,
        seed: args.seed,
        ..DatasetConfig::default()
    };

    let dataset = PairedImageDataset::from_config(config).context("Failed to open dataset")?;

    match args.preview {
        Some(index) => preview(&dataset, index, args).map(|()| true),
        None => check(&dataset),
    }
}

/// Save the preprocessed source and target at `index` as PNGs.
fn preview(dataset: &PairedImageDataset, index: usize, args: &Args) -> Result<()> {
    let sample = dataset
        .get(index)
        .with_context(|| format!("Failed to load pair {index}"))?;

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    let stem = std::path::Path::new(&sample.filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pair");

    for (suffix, tensor) in [("source", &sample.source), ("target", &sample.target)] {
        let path = args.out.join(format!("{stem}_{suffix}.png"));
        save_image(tensor, &path, 95).context("Failed to save preview")?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

/// Load every pair once and report the ones that fail.
fn check(dataset: &PairedImageDataset) -> Result<bool> {
    let pb = ProgressBar::new(dataset.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Checking [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut failed = 0usize;
    for (index, result) in dataset.iter().enumerate() {
        if let Err(err) = result {
            failed += 1;
            pb.suspend(|| tracing::warn!("Pair {index} failed: {err}"));
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    println!(
        "Checked {} pairs in {} ({} mode): {} ok, {} failed",
        dataset.len(),
        dataset.root().display(),
        dataset.mode(),
        dataset.len() - failed,
        failed
    );

    Ok(failed == 0)
}
