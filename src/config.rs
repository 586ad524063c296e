use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::db::DEFAULT_DB_PATH;
use crate::ingest::mapper::DriftWindows;
use crate::ingest::writer::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::ingest::Platform;

const DEFAULT_DATA_DIR: &str = "data";

/// Settings resolved from defaults, then an optional TOML file, then CLI/env.
///
/// ```toml
/// db_path = "data/courses.sqlite"
/// data_dir = "data"
/// batch_size = 500
///
/// [drift.language]
/// start = 8
/// end = 12
///
/// [drift.level]
/// start = 8
/// end = 14
/// ```
///
/// The drift windows are tuned to one snapshot of the Coursera export and
/// may need recalibrating when the dataset changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub drift: DriftWindows,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            batch_size: DEFAULT_BATCH_SIZE,
            drift: DriftWindows::default(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config {}", p.display()))?;
                Self::from_toml(&text).with_context(|| format!("Invalid config {}", p.display()))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_overrides(
        mut self,
        db_path: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> Result<Self> {
        if let Some(p) = db_path {
            self.db_path = p;
        }
        if let Some(d) = data_dir {
            self.data_dir = d;
        }
        if let Some(n) = batch_size {
            self.batch_size = n;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn source_path(&self, platform: Platform) -> PathBuf {
        self.data_dir.join(platform.default_file())
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            bail!("batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}", self.batch_size);
        }
        for (name, w) in [("language", self.drift.language), ("level", self.drift.level)] {
            if w.start > w.end {
                bail!("drift.{name} window is empty: start {} > end {}", w.start, w.end);
            }
        }
        Ok(())
    }
}
