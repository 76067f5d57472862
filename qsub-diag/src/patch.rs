//! Repair pass: rewrite the wrapper's bookkeeping so lost work is redone.
//!
//! Arrays are handled in run-list order. For each array that is not fully
//! finished, the tracking file is rewritten to list only finished runs. Dead
//! arrays (every index handled, some runs unfinished) also get their
//! resubmission template switched to checkpoint recovery; actually
//! resubmitting is left to the operator.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::repair::{ArrayRepairPlan, flip_checkpoint_flag, plan_array_repair};
use crate::core::types::{ArrayState, RunArrayDeclaration};
use crate::error::DiagError;
use crate::io::tracking_store::TrackingStore;
use crate::reconcile::Reconciliation;

/// Plan and apply repairs for every array in `reconciliation`.
///
/// Repeated declarations share one set of files and are planned once. Every
/// plan is made, and every dead array's template loaded and flipped, before
/// the first write: a template without the flag aborts with nothing touched.
/// `AllFinished` arrays are never written.
pub fn apply_repairs(
    reconciliation: &Reconciliation,
    store: &dyn TrackingStore,
    checkpoint_flag: &str,
) -> Result<Vec<ArrayRepairPlan>> {
    let mut seen = HashSet::new();
    let mut staged = Vec::with_capacity(reconciliation.tracked.len());

    for tracked in &reconciliation.tracked {
        let array = &tracked.array;
        if !seen.insert(array.key()) {
            debug!(
                array = %array.key(),
                line = array.line,
                "repeated declaration already planned"
            );
            continue;
        }
        let plan = plan_array_repair(tracked, &reconciliation.classification);
        debug!(array = %plan.array_key, state = ?plan.state, "repair planned");

        let flipped = if plan.needs_resubmission() {
            Some(prepare_template(store, array, checkpoint_flag)?)
        } else {
            None
        };
        staged.push((array, plan, flipped));
    }

    let mut plans = Vec::with_capacity(staged.len());
    for (array, plan, flipped) in staged {
        if plan.state == ArrayState::AllFinished {
            info!(array = %plan.array_key, "all runs finished");
            plans.push(plan);
            continue;
        }

        store
            .save_tracked_finished(array, &plan.retained_offsets)
            .with_context(|| format!("rewrite tracking file for {}", plan.array_key))?;
        if !plan.cleared_offsets.is_empty() {
            info!(
                array = %plan.array_key,
                cleared = ?plan.cleared_offsets,
                "cleared tracked offsets of unfinished runs"
            );
        }

        match flipped {
            Some(template) => {
                store
                    .save_resubmit_template(array, &template)
                    .with_context(|| format!("write template for {}", plan.array_key))?;
                warn!(
                    array = %plan.array_key,
                    stragglers = plan.unfinished_tracked.len() + plan.unfinished_dropped.len(),
                    "array needs resubmission from checkpoint"
                );
            }
            None => info!(
                array = %plan.array_key,
                pending = plan.unfinished_tracked.len(),
                "array still active; leaving remaining indices to the wrapper"
            ),
        }

        plans.push(plan);
    }

    Ok(plans)
}

/// Load `array`'s template and switch it to checkpoint recovery.
fn prepare_template(
    store: &dyn TrackingStore,
    array: &RunArrayDeclaration,
    checkpoint_flag: &str,
) -> Result<String> {
    let template = store
        .load_resubmit_template(array)
        .with_context(|| format!("load template for {}", array.key()))?;
    let flipped = flip_checkpoint_flag(&template, checkpoint_flag).ok_or_else(|| {
        DiagError::Template {
            path: store.template_location(array),
            message: format!("no '{checkpoint_flag}=0' to flip"),
        }
    })?;
    Ok(flipped)
}
