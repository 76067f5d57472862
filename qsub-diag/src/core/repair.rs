//! Per-array repair planning.
//!
//! Planning is pure: it decides what the tracking file should contain and
//! whether the resubmission template needs its checkpoint flag flipped. The
//! `patch` module applies the plan to disk.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::classifier::Classification;
use crate::core::types::{ArrayState, RunClass, TrackedArrayState};

/// Outcome of planning a single array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayRepairPlan {
    pub array_key: String,
    pub state: ArrayState,
    /// Offsets to persist in the tracking file, ascending. Only the offsets of
    /// runs that actually finished survive.
    pub retained_offsets: Vec<u64>,
    /// Tracked offsets that will be cleared because their run is not finished.
    pub cleared_offsets: Vec<u64>,
    pub unfinished_tracked: Vec<String>,
    pub unfinished_dropped: Vec<String>,
}

impl ArrayRepairPlan {
    /// Whether applying the plan writes anything.
    pub fn writes(&self) -> bool {
        self.state != ArrayState::AllFinished
    }

    pub fn needs_resubmission(&self) -> bool {
        self.state == ArrayState::DeadWithStragglers
    }
}

/// Decide how to repair the array described by `tracked`.
///
/// A run counts as finished when it is in `finished_dropped` or
/// `finished_tracked` (membership in the union of both lists).
pub fn plan_array_repair(
    tracked: &TrackedArrayState,
    classification: &Classification,
) -> ArrayRepairPlan {
    let array = &tracked.array;
    let run_ids = array.run_ids();

    let finished: HashSet<&str> = classification
        .finished_dropped
        .iter()
        .chain(&classification.finished_tracked)
        .map(String::as_str)
        .collect();
    let in_class = |class: RunClass| -> Vec<String> {
        let members: HashSet<&str> = classification
            .get(class)
            .iter()
            .map(String::as_str)
            .collect();
        run_ids
            .iter()
            .filter(|id| members.contains(id.as_str()))
            .cloned()
            .collect()
    };

    let retained_offsets: Vec<u64> = run_ids
        .iter()
        .enumerate()
        .filter(|(_, id)| finished.contains(id.as_str()))
        .map(|(offset, _)| offset as u64)
        .collect();

    if retained_offsets.len() == run_ids.len() {
        return ArrayRepairPlan {
            array_key: array.key(),
            state: ArrayState::AllFinished,
            retained_offsets,
            cleared_offsets: Vec::new(),
            unfinished_tracked: Vec::new(),
            unfinished_dropped: Vec::new(),
        };
    }

    let retained: HashSet<u64> = retained_offsets.iter().copied().collect();
    let cleared_offsets = tracked
        .tracked_finished_offsets
        .iter()
        .copied()
        .filter(|offset| !retained.contains(offset))
        .collect();

    let active = tracked.tracked_finished_run_ids().len() < run_ids.len();
    ArrayRepairPlan {
        array_key: array.key(),
        state: if active {
            ArrayState::StillActive
        } else {
            ArrayState::DeadWithStragglers
        },
        retained_offsets,
        cleared_offsets,
        unfinished_tracked: in_class(RunClass::UnfinishedTracked),
        unfinished_dropped: in_class(RunClass::UnfinishedDropped),
    }
}

/// Flip the checkpoint-recovery flag `{flag}=0` to `{flag}=1`.
///
/// Exactly the first occurrence is rewritten; every other byte is preserved.
/// Returns `None` when the template has no `{flag}=0`.
pub fn flip_checkpoint_flag(template: &str, flag: &str) -> Option<String> {
    let off = format!("{flag}=0");
    let pos = template.find(&off)?;
    let mut flipped = String::with_capacity(template.len());
    flipped.push_str(&template[..pos]);
    flipped.push_str(flag);
    flipped.push_str("=1");
    flipped.push_str(&template[pos + off.len()..]);
    Some(flipped)
}
