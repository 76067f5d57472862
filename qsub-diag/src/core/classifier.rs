//! Deterministic classification of declared runs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::RunClass;

/// Classify one run from what is on disk and what the wrapper believes.
///
/// - `present`: a run directory exists under `dest_dir`.
/// - `done`: the done predicate holds for that directory (ignored if absent).
/// - `tracked_finished`: the wrapper's status file lists the run.
pub fn classify_run(present: bool, done: bool, tracked_finished: bool) -> RunClass {
    match (present, done, tracked_finished) {
        (false, _, _) => RunClass::Missing,
        (true, true, true) => RunClass::FinishedDropped,
        (true, true, false) => RunClass::FinishedTracked,
        (true, false, true) => RunClass::UnfinishedDropped,
        (true, false, false) => RunClass::UnfinishedTracked,
    }
}

/// Five ordered run-id sequences, one per [`RunClass`].
///
/// Runs keep the order in which they were pushed, which callers keep equal to
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub missing: Vec<String>,
    pub finished_dropped: Vec<String>,
    pub finished_tracked: Vec<String>,
    pub unfinished_dropped: Vec<String>,
    pub unfinished_tracked: Vec<String>,
    /// Runs whose done predicate failed; they are classified as unfinished.
    pub probe_failures: Vec<String>,
}

impl Classification {
    pub fn push(&mut self, class: RunClass, run_id: impl Into<String>) {
        self.get_mut(class).push(run_id.into());
    }

    pub fn get(&self, class: RunClass) -> &[String] {
        match class {
            RunClass::Missing => &self.missing,
            RunClass::FinishedDropped => &self.finished_dropped,
            RunClass::FinishedTracked => &self.finished_tracked,
            RunClass::UnfinishedDropped => &self.unfinished_dropped,
            RunClass::UnfinishedTracked => &self.unfinished_tracked,
        }
    }

    fn get_mut(&mut self, class: RunClass) -> &mut Vec<String> {
        match class {
            RunClass::Missing => &mut self.missing,
            RunClass::FinishedDropped => &mut self.finished_dropped,
            RunClass::FinishedTracked => &mut self.finished_tracked,
            RunClass::UnfinishedDropped => &mut self.unfinished_dropped,
            RunClass::UnfinishedTracked => &mut self.unfinished_tracked,
        }
    }

    /// Number of classified runs across all five sets.
    pub fn total(&self) -> usize {
        RunClass::ALL.iter().map(|class| self.get(*class).len()).sum()
    }

    /// Run id → class lookup. Later duplicates overwrite earlier ones.
    pub fn index(&self) -> BTreeMap<&str, RunClass> {
        let mut index = BTreeMap::new();
        for class in RunClass::ALL {
            for run_id in self.get(class) {
                index.insert(run_id.as_str(), class);
            }
        }
        index
    }

    pub fn counts(&self) -> BTreeMap<RunClass, usize> {
        RunClass::ALL
            .iter()
            .map(|class| (*class, self.get(*class).len()))
            .collect()
    }
}
