//! Pipeline configuration.
//!
//! Everything the stages need (paths, competition name, target column, split
//! parameters) lives in one struct that is built once at startup and handed
//! to the [`Pipeline`](crate::pipeline::Pipeline). An optional TOML file can
//! override any subset of the defaults.

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory by the CLI.
pub const CONFIG_FILE_NAME: &str = "churnprep.toml";

/// Default Kaggle REST API root.
pub const KAGGLE_API_BASE: &str = "https://www.kaggle.com/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Kaggle competition identifier; also names the downloaded archive.
    pub competition: String,

    /// Column used as the stratification label.
    pub target_column: String,

    /// Fraction of rows held out for the test file.
    pub test_fraction: f64,

    /// Seed for the split RNG.
    pub seed: u64,

    /// Root of the data tree. Raw files go to `{data_dir}/raw`.
    pub data_dir: PathBuf,

    pub kaggle: KaggleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct KaggleConfig {
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            competition: "playground-series-s4e1".into(),
            target_column: "Exited".into(),
            test_fraction: 0.3,
            seed: 42,
            data_dir: PathBuf::from("data"),
            kaggle: KaggleConfig::default(),
        }
    }
}

impl Default for KaggleConfig {
    fn default() -> Self {
        Self {
            api_base: KAGGLE_API_BASE.into(),
            timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PrepError> {
        let content = std::fs::read_to_string(path).map_err(|e| PrepError::from_io(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, PrepError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PrepError::Config(format!("parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, PrepError> {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading pipeline config");
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), PrepError> {
        if self.competition.trim().is_empty() {
            return Err(PrepError::Config("competition must not be empty".into()));
        }
        if self.target_column.is_empty() {
            return Err(PrepError::Config("target_column must not be empty".into()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PrepError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.kaggle.api_base.is_empty() {
            return Err(PrepError::Config("kaggle.api_base must not be empty".into()));
        }
        Ok(())
    }

    /// Directory holding the downloaded archive and extracted files.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Directory receiving the split outputs.
    pub fn research_dir(&self) -> PathBuf {
        self.raw_dir().join("research")
    }

    /// `{raw_dir}/{competition}.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.raw_dir().join(format!("{}.zip", self.competition))
    }

    /// The extracted table the split stage reads.
    pub fn raw_dataset_path(&self) -> PathBuf {
        self.raw_dir().join("train.csv")
    }
}
