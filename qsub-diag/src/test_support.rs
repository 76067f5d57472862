//! Test-only helpers for building `dist_qsub` destination directories.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::run_list::parse_run_list;
use crate::core::types::{RunArrayDeclaration, RunList};
use crate::error::DiagError;
use crate::io::paths::{DONE_ARRAYJOBS_SUFFIX, QSUB_DONE_SUFFIX, QsubPaths};
use crate::io::probe::RunStatusProbe;
use crate::io::tracking_store::{FsTrackingStore, TrackingStore, render_offsets};

/// Marker written to `run.log` by [`DistFixture::add_finished_run`].
pub const DONE_MARKER: &str = "Run finished";

/// Temporary directory laid out like a `dist_qsub` experiment:
///
/// ```text
/// <root>/runs.txt
/// <root>/dest/<run_id>/run.log
/// <root>/dest/qsub_files/<key>.qsub_done_arrayjobs.txt
/// <root>/dest/qsub_files/<key>.qsub_done
/// <root>/out/
/// ```
pub struct DistFixture {
    temp: TempDir,
    paths: QsubPaths,
}

impl DistFixture {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let paths = QsubPaths::new(temp.path().join("dest"), "qsub_files");
        fs::create_dir_all(&paths.qsub_dir).context("create qsub dir")?;
        Ok(Self { temp, paths })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &QsubPaths {
        &self.paths
    }

    pub fn store(&self) -> FsTrackingStore {
        FsTrackingStore::new(self.paths.clone())
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("out")
    }

    /// Expand `{dest}` in `template` to the fixture's destination directory.
    pub fn run_list_text(&self, template: &str) -> String {
        template.replace("{dest}", &self.paths.dest_dir.display().to_string())
    }

    /// Parse a run list after expanding `{dest}`.
    pub fn run_list(&self, template: &str) -> RunList {
        parse_run_list("runs.txt", &self.run_list_text(template)).expect("fixture run list")
    }

    /// Write `runs.txt` (with `{dest}` expanded) and return its path.
    pub fn write_run_list(&self, template: &str) -> Result<PathBuf> {
        let path = self.root().join("runs.txt");
        fs::write(&path, self.run_list_text(template))
            .with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Create an unfinished run (directory with a log lacking the marker).
    pub fn add_run(&self, run_id: &str) -> Result<PathBuf> {
        self.add_run_with_log(run_id, "update 0\n")
    }

    /// Create a run whose `run.log` contains [`DONE_MARKER`].
    pub fn add_finished_run(&self, run_id: &str) -> Result<PathBuf> {
        self.add_run_with_log(run_id, &format!("update 0\n{DONE_MARKER}\n"))
    }

    fn add_run_with_log(&self, run_id: &str, log: &str) -> Result<PathBuf> {
        let dir = self.paths.run_dir(run_id);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        fs::write(dir.join("run.log"), log).context("write run.log")?;
        Ok(dir)
    }

    pub fn tracking_path(&self, key: &str) -> PathBuf {
        self.paths
            .qsub_dir
            .join(format!("{key}{DONE_ARRAYJOBS_SUFFIX}"))
    }

    pub fn template_path(&self, key: &str) -> PathBuf {
        self.paths.qsub_dir.join(format!("{key}{QSUB_DONE_SUFFIX}"))
    }

    pub fn write_tracking(&self, key: &str, offsets: &[u64]) -> Result<()> {
        let path = self.tracking_path(key);
        fs::write(&path, render_offsets(offsets))
            .with_context(|| format!("write {}", path.display()))
    }

    pub fn write_template(&self, key: &str, text: &str) -> Result<()> {
        let path = self.template_path(key);
        fs::write(&path, text).with_context(|| format!("write {}", path.display()))
    }

    pub fn read_tracking(&self, key: &str) -> Result<String> {
        let path = self.tracking_path(key);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn read_template(&self, key: &str) -> Result<String> {
        let path = self.template_path(key);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn read_artifact(&self, name: &str) -> Result<String> {
        let path = self.out_dir().join(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

/// Probe answering from fixed run-id sets and counting calls.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    done: HashSet<String>,
    failing: HashSet<String>,
    calls: Cell<usize>,
}

impl ScriptedProbe {
    pub fn done(run_ids: &[&str]) -> Self {
        Self {
            done: run_ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Make the probe fail for `run_ids`.
    pub fn failing(mut self, run_ids: &[&str]) -> Self {
        self.failing = run_ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RunStatusProbe for ScriptedProbe {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_run_done(&self, run_path: &Path) -> Result<bool, DiagError> {
        self.calls.set(self.calls.get() + 1);
        let run_id = run_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&run_id) {
            return Err(DiagError::ProbeRead {
                run_path: run_path.to_path_buf(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.done.contains(&run_id))
    }
}

/// In-memory [`TrackingStore`] counting every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tracking: RefCell<BTreeMap<String, Vec<u64>>>,
    templates: RefCell<BTreeMap<String, String>>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn seed(&self, array: &RunArrayDeclaration, offsets: &[u64], template: &str) {
        self.tracking
            .borrow_mut()
            .insert(array.key(), offsets.to_vec());
        self.templates
            .borrow_mut()
            .insert(array.key(), template.to_string());
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn offsets(&self, array: &RunArrayDeclaration) -> Vec<u64> {
        self.tracking
            .borrow()
            .get(&array.key())
            .cloned()
            .unwrap_or_default()
    }

    pub fn template(&self, array: &RunArrayDeclaration) -> String {
        self.templates
            .borrow()
            .get(&array.key())
            .cloned()
            .unwrap_or_default()
    }
}

impl TrackingStore for MemoryStore {
    fn load_tracked_finished(
        &self,
        array: &RunArrayDeclaration,
    ) -> Result<BTreeSet<u64>, DiagError> {
        self.tracking
            .borrow()
            .get(&array.key())
            .map(|offsets| offsets.iter().copied().collect())
            .ok_or_else(|| DiagError::missing("tracking file", array.key()))
    }

    fn save_tracked_finished(
        &self,
        array: &RunArrayDeclaration,
        offsets: &[u64],
    ) -> Result<(), DiagError> {
        self.writes.set(self.writes.get() + 1);
        self.tracking
            .borrow_mut()
            .insert(array.key(), offsets.to_vec());
        Ok(())
    }

    fn template_location(&self, array: &RunArrayDeclaration) -> PathBuf {
        PathBuf::from(format!("memory/{}{QSUB_DONE_SUFFIX}", array.key()))
    }

    fn load_resubmit_template(&self, array: &RunArrayDeclaration) -> Result<String, DiagError> {
        self.templates
            .borrow()
            .get(&array.key())
            .cloned()
            .ok_or_else(|| DiagError::missing("resubmission template", array.key()))
    }

    fn save_resubmit_template(
        &self,
        array: &RunArrayDeclaration,
        text: &str,
    ) -> Result<(), DiagError> {
        self.writes.set(self.writes.get() + 1);
        self.templates
            .borrow_mut()
            .insert(array.key(), text.to_string());
        Ok(())
    }
}
