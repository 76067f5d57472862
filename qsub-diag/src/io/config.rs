//! Diagnostics configuration stored in `qsub_diag.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::DiagError;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "qsub_diag.toml";

/// Diagnostics configuration (TOML).
///
/// Every field has a default matching the `dist_qsub` layout, so an absent
/// file is equivalent to an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagConfig {
    /// Directory under `dest_dir` holding the wrapper's bookkeeping files.
    pub qsub_dir: String,

    /// Per-run log scanned by the `--done-str` predicate.
    pub run_log: String,

    /// Template variable flipped from `0` to `1` to request checkpoint recovery.
    pub checkpoint_flag: String,

    /// Abort on the first run whose done predicate cannot be evaluated.
    pub strict_probe: bool,

    /// Where `.diag` artifacts are written. Defaults to the working directory.
    pub out_dir: Option<PathBuf>,

    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeConfig {
    pub fitness_csv: FitnessCsvConfig,
}

/// Settings for the built-in `fitness_csv` done predicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FitnessCsvConfig {
    /// CSV path relative to the run directory.
    pub path: String,
    /// Header column compared against `target`.
    pub column: String,
    /// The run is done once any row holds this value in `column`.
    pub target: String,
}

impl Default for FitnessCsvConfig {
    fn default() -> Self {
        Self {
            path: "output/fitness.csv".to_string(),
            column: "update".to_string(),
            target: "50000".to_string(),
        }
    }
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            qsub_dir: "qsub_files".to_string(),
            run_log: "run.log".to_string(),
            checkpoint_flag: "CPR".to_string(),
            strict_probe: false,
            out_dir: None,
            probe: ProbeConfig::default(),
        }
    }
}

impl DiagConfig {
    pub fn validate(&self) -> Result<(), DiagError> {
        if self.qsub_dir.trim().is_empty() {
            return Err(DiagError::Config("qsub_dir must not be empty".to_string()));
        }
        if self.run_log.trim().is_empty() {
            return Err(DiagError::Config("run_log must not be empty".to_string()));
        }
        if self.checkpoint_flag.is_empty()
            || !self
                .checkpoint_flag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DiagError::Config(format!(
                "checkpoint_flag must be a shell variable name (got '{}')",
                self.checkpoint_flag
            )));
        }
        let fitness = &self.probe.fitness_csv;
        if fitness.path.trim().is_empty() || fitness.column.trim().is_empty() {
            return Err(DiagError::Config(
                "probe.fitness_csv.path and probe.fitness_csv.column must not be empty"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DiagConfig::default()`.
pub fn load_config(path: &Path) -> Result<DiagConfig> {
    if !path.exists() {
        let cfg = DiagConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DiagConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
