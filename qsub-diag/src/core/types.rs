//! Shared deterministic types for diagnostics core logic.
//!
//! These types define stable contracts between the parser, the classifier and
//! the repair planner. They do not touch the filesystem and must stay
//! deterministic across runs: every collection here is ordered.

use std::collections::BTreeSet;

use serde::Serialize;

/// One `<low>..<high> <name>` line of a run list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArrayDeclaration {
    pub base_name: String,
    /// Inclusive lower bound of the array index range.
    pub low: i64,
    /// Inclusive upper bound; `low <= high`.
    pub high: i64,
    /// 1-based line number in the run list.
    pub line: usize,
}

impl RunArrayDeclaration {
    /// Key used by the wrapper to name this array's files (`name_low..high`).
    pub fn key(&self) -> String {
        format!("{}_{}..{}", self.base_name, self.low, self.high)
    }

    /// Number of indices, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        usize::try_from(self.high.abs_diff(self.low))
            .map_or(usize::MAX, |span| span.saturating_add(1))
    }

    pub fn is_empty(&self) -> bool {
        self.high < self.low
    }

    /// Run id for an absolute array index.
    pub fn run_id(&self, index: i64) -> String {
        format!("{}_{}", self.base_name, index)
    }

    /// Absolute index addressed by `offset`, or `None` if it overflows `i64`.
    pub fn index_at(&self, offset: u64) -> Option<i64> {
        self.low.checked_add_unsigned(offset)
    }

    /// Run ids in ascending index order.
    pub fn run_ids(&self) -> Vec<String> {
        (self.low..=self.high).map(|i| self.run_id(i)).collect()
    }

    /// Zero-based offset of `run_id` within this array, if it belongs here.
    pub fn offset_of(&self, run_id: &str) -> Option<u64> {
        let index: i64 = run_id
            .strip_prefix(self.base_name.as_str())?
            .strip_prefix('_')?
            .parse()
            .ok()?;
        if index < self.low || index > self.high {
            return None;
        }
        Some(index.abs_diff(self.low))
    }
}

/// `set <key> <value>` assignments, in first-assignment order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunListSettings {
    entries: Vec<(String, String)>,
}

impl RunListSettings {
    /// Insert or overwrite `key`, keeping the position of its first assignment.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parsed run list: array declarations plus free-form settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunList {
    pub arrays: Vec<RunArrayDeclaration>,
    pub settings: RunListSettings,
}

impl RunList {
    /// Every declared run id, declaration order then ascending index.
    pub fn run_ids(&self) -> Vec<String> {
        self.arrays
            .iter()
            .flat_map(RunArrayDeclaration::run_ids)
            .collect()
    }
}

/// What the wrapper believes about one array, loaded from its status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedArrayState {
    pub array: RunArrayDeclaration,
    /// Offsets (relative to `array.low`) the wrapper is done handling.
    pub tracked_finished_offsets: BTreeSet<u64>,
}

impl TrackedArrayState {
    pub fn new(array: RunArrayDeclaration, offsets: impl IntoIterator<Item = u64>) -> Self {
        Self {
            array,
            tracked_finished_offsets: offsets.into_iter().collect(),
        }
    }

    /// Run ids named by the tracked offsets. Offsets past the array still
    /// name a run (possibly of another declaration); offsets whose index
    /// overflows `i64` name none and are skipped.
    pub fn tracked_finished_run_ids(&self) -> BTreeSet<String> {
        self.tracked_finished_offsets
            .iter()
            .filter_map(|offset| self.array.index_at(*offset))
            .map(|index| self.array.run_id(index))
            .collect()
    }

    /// Offsets that do not address any index of the array.
    pub fn out_of_range_offsets(&self) -> Vec<u64> {
        let len = self.array.len() as u64;
        self.tracked_finished_offsets
            .iter()
            .copied()
            .filter(|offset| *offset >= len)
            .collect()
    }
}

/// Disposition of a single declared run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunClass {
    /// No run directory under `dest_dir`.
    Missing,
    /// Done, and the wrapper agrees it is done.
    FinishedDropped,
    /// Done, but the wrapper still tracks it as pending.
    FinishedTracked,
    /// Not done, but the wrapper stopped tracking it.
    UnfinishedDropped,
    /// Not done and still tracked by the wrapper.
    UnfinishedTracked,
}

impl RunClass {
    pub const ALL: [RunClass; 5] = [
        RunClass::Missing,
        RunClass::FinishedDropped,
        RunClass::FinishedTracked,
        RunClass::UnfinishedDropped,
        RunClass::UnfinishedTracked,
    ];

    /// File name of the artifact listing runs of this class.
    pub fn artifact_name(self) -> &'static str {
        match self {
            RunClass::Missing => "MISSING.diag",
            RunClass::FinishedDropped => "FINISHED.diag",
            RunClass::FinishedTracked => "FINISHED_TRACKED.diag",
            RunClass::UnfinishedDropped => "UNFINISHED_DROPPED.diag",
            RunClass::UnfinishedTracked => "UNFINISHED_TRACKED.diag",
        }
    }

    /// Whether the artifact is written even when the class is empty.
    pub fn always_written(self) -> bool {
        !matches!(self, RunClass::FinishedTracked)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, RunClass::FinishedDropped | RunClass::FinishedTracked)
    }

    pub fn label(self) -> &'static str {
        match self {
            RunClass::Missing => "missing",
            RunClass::FinishedDropped => "finished_dropped",
            RunClass::FinishedTracked => "finished_tracked",
            RunClass::UnfinishedDropped => "unfinished_dropped",
            RunClass::UnfinishedTracked => "unfinished_tracked",
        }
    }
}

/// Per-array repair decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayState {
    /// Every run finished; nothing to write.
    AllFinished,
    /// The wrapper still has indices left to process.
    StillActive,
    /// The wrapper handled every index but some runs never finished.
    DeadWithStragglers,
}
