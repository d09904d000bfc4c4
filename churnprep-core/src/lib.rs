//! churnprep core: competition data acquisition and stratified splitting.
//!
//! This crate contains every pipeline stage:
//! - Archive fetching from Kaggle behind the `ArchiveFetcher` trait
//! - Zip extraction with entry-path sanitization
//! - Single-file removal
//! - CSV loading and the seeded stratified train/test splitter
//! - The pipeline driver that sequences enabled stages

pub mod config;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs_ops;
pub mod pipeline;
pub mod split;

#[cfg(test)]
mod test_support;

pub use config::{KaggleConfig, PipelineConfig, CONFIG_FILE_NAME};
pub use dataset::{ColumnKind, Dataset};
pub use error::PrepError;
pub use extract::extract;
pub use fetch::{ArchiveFetcher, Credentials, KaggleFetcher};
pub use fs_ops::remove;
pub use pipeline::{Pipeline, RunReport, Stage, StageToggles};
pub use split::{split, split_with, Partition, SplitFiles, SplitParams};
