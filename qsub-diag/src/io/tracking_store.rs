//! Storage for the wrapper's per-array bookkeeping files.
//!
//! `dist_qsub` keeps two files per array under `dest_dir/qsub_files/`:
//! the status file listing array offsets it is done handling, and the
//! submission template used to (re)submit the array. Both are rewritten by
//! full replacement; there is no locking against a running wrapper.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::types::RunArrayDeclaration;
use crate::error::DiagError;
use crate::io::paths::QsubPaths;

/// Read/write access to tracking state and resubmission templates.
pub trait TrackingStore {
    /// Offsets the wrapper believes are finished. A missing file is fatal.
    fn load_tracked_finished(&self, array: &RunArrayDeclaration)
    -> Result<BTreeSet<u64>, DiagError>;

    /// Overwrite the status file with `offsets`, one per line, in order.
    fn save_tracked_finished(
        &self,
        array: &RunArrayDeclaration,
        offsets: &[u64],
    ) -> Result<(), DiagError>;

    /// Where the resubmission template lives, for error messages.
    fn template_location(&self, array: &RunArrayDeclaration) -> PathBuf;

    fn load_resubmit_template(&self, array: &RunArrayDeclaration) -> Result<String, DiagError>;

    fn save_resubmit_template(
        &self,
        array: &RunArrayDeclaration,
        text: &str,
    ) -> Result<(), DiagError>;
}

/// [`TrackingStore`] backed by `dest_dir/<qsub_dir>/`.
#[derive(Debug, Clone)]
pub struct FsTrackingStore {
    paths: QsubPaths,
}

impl FsTrackingStore {
    pub fn new(paths: QsubPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &QsubPaths {
        &self.paths
    }
}

impl TrackingStore for FsTrackingStore {
    fn load_tracked_finished(
        &self,
        array: &RunArrayDeclaration,
    ) -> Result<BTreeSet<u64>, DiagError> {
        let path = self.paths.tracking_file(array);
        debug!(path = %path.display(), "loading tracking file");
        let contents = read_required(&path, "tracking file")?;
        parse_offsets(&path.display().to_string(), &contents)
    }

    fn save_tracked_finished(
        &self,
        array: &RunArrayDeclaration,
        offsets: &[u64],
    ) -> Result<(), DiagError> {
        let path = self.paths.tracking_file(array);
        debug!(path = %path.display(), count = offsets.len(), "writing tracking file");
        write_atomic(&path, &render_offsets(offsets))
    }

    fn template_location(&self, array: &RunArrayDeclaration) -> PathBuf {
        self.paths.template_file(array)
    }

    fn load_resubmit_template(&self, array: &RunArrayDeclaration) -> Result<String, DiagError> {
        read_required(&self.paths.template_file(array), "resubmission template")
    }

    fn save_resubmit_template(
        &self,
        array: &RunArrayDeclaration,
        text: &str,
    ) -> Result<(), DiagError> {
        let path = self.paths.template_file(array);
        debug!(path = %path.display(), "writing resubmission template");
        write_atomic(&path, text)
    }
}

/// Parse status-file content: one integer per line, blank lines ignored.
pub fn parse_offsets(source_name: &str, contents: &str) -> Result<BTreeSet<u64>, DiagError> {
    let mut offsets = BTreeSet::new();
    for (idx, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let offset = trimmed.parse::<u64>().map_err(|err| {
            DiagError::parse(
                source_name,
                idx + 1,
                format!("invalid array offset '{trimmed}': {err}"),
            )
        })?;
        offsets.insert(offset);
    }
    Ok(offsets)
}

/// One offset per line, newline terminated; empty input renders as "".
pub fn render_offsets(offsets: &[u64]) -> String {
    let mut buf = String::new();
    for offset in offsets {
        buf.push_str(&offset.to_string());
        buf.push('\n');
    }
    buf
}

fn read_required(path: &Path, what: &'static str) -> Result<String, DiagError> {
    if !path.is_file() {
        return Err(DiagError::missing(what, path));
    }
    fs::read_to_string(path).map_err(|err| DiagError::io(path, err))
}

/// Replace `path` via temp file + rename so readers never see a partial file.
fn write_atomic(path: &Path, contents: &str) -> Result<(), DiagError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents).map_err(|err| DiagError::io(&tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| DiagError::io(path, err))
}
