//! Canonical paths of a `dist_qsub` destination directory.

use std::path::PathBuf;

use crate::core::types::RunArrayDeclaration;

/// Suffix of the wrapper's per-array status file.
pub const DONE_ARRAYJOBS_SUFFIX: &str = ".qsub_done_arrayjobs.txt";
/// Suffix of the per-array resubmission template.
pub const QSUB_DONE_SUFFIX: &str = ".qsub_done";

/// All paths the diagnostics pass reads or writes under `dest_dir`.
#[derive(Debug, Clone)]
pub struct QsubPaths {
    pub dest_dir: PathBuf,
    pub qsub_dir: PathBuf,
}

impl QsubPaths {
    pub fn new(dest_dir: impl Into<PathBuf>, qsub_dir_name: &str) -> Self {
        let dest_dir = dest_dir.into();
        Self {
            qsub_dir: dest_dir.join(qsub_dir_name),
            dest_dir,
        }
    }

    /// Directory where the run with `run_id` writes its output.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.dest_dir.join(run_id)
    }

    /// `{key}.qsub_done_arrayjobs.txt`: offsets the wrapper is done with.
    pub fn tracking_file(&self, array: &RunArrayDeclaration) -> PathBuf {
        self.qsub_dir
            .join(format!("{}{}", array.key(), DONE_ARRAYJOBS_SUFFIX))
    }

    /// `{key}.qsub_done`: submission file used to resubmit the array.
    pub fn template_file(&self, array: &RunArrayDeclaration) -> PathBuf {
        self.qsub_dir
            .join(format!("{}{}", array.key(), QSUB_DONE_SUFFIX))
    }
}
