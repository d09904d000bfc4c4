//! Pipeline driver: runs the enabled stages in fixed order.
//!
//! Order: fetch → extract → remove archive → split. Stages only share data
//! through the filesystem; none inspects another's output. The first failing
//! stage stops the run and its error is returned unchanged. Partial output is
//! left in place.

use crate::config::PipelineConfig;
use crate::error::PrepError;
use crate::extract::extract;
use crate::fetch::ArchiveFetcher;
use crate::fs_ops::remove;
use crate::split::{split_with, SplitParams};
use std::fmt;

/// Which stages to run. All default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageToggles {
    pub fetch: bool,
    pub extract: bool,
    pub remove_archive: bool,
    pub split: bool,
}

impl StageToggles {
    pub fn all() -> Self {
        Self {
            fetch: true,
            extract: true,
            remove_archive: true,
            split: true,
        }
    }

    fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.fetch,
            Stage::Extract => self.extract,
            Stage::RemoveArchive => self.remove_archive,
            Stage::Split => self.split,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    RemoveArchive,
    Split,
}

impl Stage {
    /// Execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::Fetch,
        Stage::Extract,
        Stage::RemoveArchive,
        Stage::Split,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::RemoveArchive => "remove-archive",
            Stage::Split => "split",
        };
        f.write_str(name)
    }
}

/// Stages that completed, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: Vec<Stage>,
}

pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Box<dyn ArchiveFetcher>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, fetcher: Box<dyn ArchiveFetcher>) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every enabled stage in order, stopping at the first failure.
    pub fn run(&self, stages: StageToggles) -> Result<RunReport, PrepError> {
        let mut report = RunReport::default();

        for stage in Stage::ORDER {
            if !stages.is_enabled(stage) {
                continue;
            }
            tracing::info!(%stage, "stage started");
            if let Err(e) = self.run_stage(stage) {
                tracing::error!(%stage, error = %e, "stage failed");
                return Err(e);
            }
            tracing::info!(%stage, "stage finished");
            report.completed.push(stage);
        }

        if report.completed.is_empty() {
            tracing::info!("no stages enabled; nothing to do");
        }
        Ok(report)
    }

    fn run_stage(&self, stage: Stage) -> Result<(), PrepError> {
        let config = &self.config;
        match stage {
            Stage::Fetch => {
                tracing::debug!(source = self.fetcher.name(), "using fetcher");
                self.fetcher
                    .fetch(&config.competition, &config.raw_dir())
                    .map(|_| ())
            }
            Stage::Extract => extract(&config.archive_path(), &config.raw_dir()).map(|_| ()),
            Stage::RemoveArchive => remove(&config.archive_path()),
            Stage::Split => {
                let params = SplitParams {
                    test_fraction: config.test_fraction,
                    seed: config.seed,
                };
                split_with(
                    &config.raw_dataset_path(),
                    &config.research_dir(),
                    &config.target_column,
                    &params,
                )
                .map(|_| ())
            }
        }
    }
}
