//! Diagnostic artifacts (`*.diag`) and the console summary.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classifier::Classification;
use crate::core::repair::ArrayRepairPlan;
use crate::core::types::{RunClass, RunList, TrackedArrayState};

/// Write one `.diag` file per class into `out_dir`, in fixed order.
///
/// Each file lists run ids joined by newlines (no trailing newline). Empty
/// classes still get a file, except `FINISHED_TRACKED.diag`, which only
/// appears when the wrapper is lagging behind finished runs. Returns the
/// paths written.
pub fn write_artifacts(out_dir: &Path, classification: &Classification) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let mut written = Vec::new();
    for class in RunClass::ALL {
        let runs = classification.get(class);
        let path = out_dir.join(class.artifact_name());
        if runs.is_empty() && !class.always_written() {
            continue;
        }
        fs::write(&path, runs.join("\n"))
            .with_context(|| format!("write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Machine-readable summary printed with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct DiagSummary<'a> {
    pub settings: BTreeMap<&'a str, &'a str>,
    pub total_runs: usize,
    pub accounted_runs: usize,
    pub counts: BTreeMap<&'static str, usize>,
    pub classification: &'a Classification,
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repairs: Option<&'a [ArrayRepairPlan]>,
}

impl<'a> DiagSummary<'a> {
    pub fn new(
        run_list: &'a RunList,
        classification: &'a Classification,
        artifacts: &[PathBuf],
        repairs: Option<&'a [ArrayRepairPlan]>,
    ) -> Self {
        Self {
            settings: run_list.settings.iter().collect(),
            total_runs: run_list.run_ids().len(),
            accounted_runs: classification.total(),
            counts: classification
                .counts()
                .into_iter()
                .map(|(class, count)| (class.label(), count))
                .collect(),
            classification,
            artifacts: artifacts
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            repairs,
        }
    }
}

/// Human-readable report, one `key: value` style line per fact.
///
/// With `detail`, the report also lists every expected run and the runs the
/// wrapper is finished tracking.
pub fn render_text(
    run_list: &RunList,
    classification: &Classification,
    repairs: Option<&[ArrayRepairPlan]>,
    detail: Option<&[TrackedArrayState]>,
) -> String {
    let mut out = String::new();
    out.push_str("Run list settings:\n");
    for (key, value) in run_list.settings.iter() {
        out.push_str(&format!("  {key} = {value}\n"));
    }
    out.push_str("Arrays:\n");
    for array in &run_list.arrays {
        out.push_str(&format!("  {} ({} runs)\n", array.key(), array.len()));
    }
    if let Some(tracked) = detail {
        out.push_str("Expected runs:\n");
        for run_id in run_list.run_ids() {
            out.push_str(&format!("  {run_id}\n"));
        }
        let finished_tracking: BTreeSet<String> = tracked
            .iter()
            .flat_map(TrackedArrayState::tracked_finished_run_ids)
            .collect();
        out.push_str("Runs dist_qsub is finished tracking:\n");
        for run_id in &finished_tracking {
            out.push_str(&format!("  {run_id}\n"));
        }
    }
    for class in RunClass::ALL {
        out.push_str(&format!(
            "{}: {}\n",
            class.label(),
            classification.get(class).len()
        ));
    }
    if !classification.probe_failures.is_empty() {
        out.push_str(&format!(
            "probe_failures: {} ({})\n",
            classification.probe_failures.len(),
            classification.probe_failures.join(", ")
        ));
    }
    out.push_str(&format!(
        "Total runs: {}\nTotal runs accounted for: {}\n",
        run_list.run_ids().len(),
        classification.total()
    ));
    if let Some(plans) = repairs {
        for plan in plans {
            out.push_str(&format!(
                "patch: {} state={:?} kept={} cleared={}{}\n",
                plan.array_key,
                plan.state,
                plan.retained_offsets.len(),
                plan.cleared_offsets.len(),
                if plan.needs_resubmission() {
                    " (resubmit from checkpoint)"
                } else {
                    ""
                }
            ));
        }
    }
    out
}
