//! churnprep CLI: competition data download and train/test split helper.
//!
//! Flags (independent, all optional, run in this order):
//! - `--download-compressed`: fetch the competition archive from Kaggle
//! - `--extract-compressed`: unzip the archive into the raw data directory
//! - `--remove-download`: delete the downloaded archive
//! - `--split-train-test`: write stratified `train.csv`/`test.csv` under `research/`

use anyhow::{Context, Result};
use churnprep_core::{
    KaggleFetcher, Pipeline, PipelineConfig, Stage, StageToggles, CONFIG_FILE_NAME,
};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "churnprep", about = "Competition files download helper")]
struct Cli {
    /// Download the compressed competition files.
    #[arg(long, default_value_t = false)]
    download_compressed: bool,

    /// Extract the downloaded archive into the raw data directory.
    #[arg(long, default_value_t = false)]
    extract_compressed: bool,

    /// Remove the downloaded archive.
    #[arg(long, default_value_t = false)]
    remove_download: bool,

    /// Split the raw training table into stratified train/test files.
    #[arg(long, default_value_t = false)]
    split_train_test: bool,
}

impl Cli {
    fn stages(&self) -> StageToggles {
        StageToggles {
            fetch: self.download_compressed,
            extract: self.extract_compressed,
            remove_archive: self.remove_download,
            split: self.split_train_test,
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = PipelineConfig::load_or_default(Path::new(CONFIG_FILE_NAME))
        .with_context(|| format!("failed to load {CONFIG_FILE_NAME}"))?;
    let fetcher = KaggleFetcher::new(&config.kaggle)?;
    let pipeline = Pipeline::new(config, Box::new(fetcher));

    let report = pipeline.run(cli.stages()).context("pipeline aborted")?;

    for stage in &report.completed {
        println!("  OK: {stage}");
    }
    if report.completed.contains(&Stage::Split) {
        println!(
            "Split written to: {}",
            pipeline.config().research_dir().display()
        );
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
