//! Reconciliation pass: compare the wrapper's bookkeeping with the runs on
//! disk and write the `.diag` artifacts.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::core::classifier::{Classification, classify_run};
use crate::core::invariants::validate_partition;
use crate::core::repair::ArrayRepairPlan;
use crate::core::run_list::parse_run_list;
use crate::core::types::{RunList, TrackedArrayState};
use crate::error::DiagError;
use crate::io::config::DiagConfig;
use crate::io::diag_report::write_artifacts;
use crate::io::paths::QsubPaths;
use crate::io::probe::{ProbeRegistry, ProbeSelection, RunStatusProbe};
use crate::io::tracking_store::{FsTrackingStore, TrackingStore};
use crate::patch::apply_repairs;

/// Classification together with the tracked state it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub classification: Classification,
    /// One entry per declaration, in run-list order.
    pub tracked: Vec<TrackedArrayState>,
}

/// Load every array's tracked state. Any missing tracking file aborts.
pub fn load_tracked_states(
    run_list: &RunList,
    store: &dyn TrackingStore,
) -> Result<Vec<TrackedArrayState>, DiagError> {
    let mut states = Vec::with_capacity(run_list.arrays.len());
    for array in &run_list.arrays {
        let offsets = store.load_tracked_finished(array)?;
        let state = TrackedArrayState::new(array.clone(), offsets);
        let stray = state.out_of_range_offsets();
        if !stray.is_empty() {
            warn!(
                array = %array.key(),
                offsets = ?stray,
                "tracking file lists offsets outside the array range"
            );
        }
        let unnamed: Vec<u64> = stray
            .into_iter()
            .filter(|offset| array.index_at(*offset).is_none())
            .collect();
        if !unnamed.is_empty() {
            warn!(
                array = %array.key(),
                offsets = ?unnamed,
                "ignoring tracked offsets that name no run"
            );
        }
        debug!(
            array = %array.key(),
            tracked = state.tracked_finished_offsets.len(),
            "tracked state loaded"
        );
        states.push(state);
    }
    Ok(states)
}

/// Classify every declared run.
///
/// Tracked state for all arrays is loaded before the first run is probed.
/// Each run is probed at most once. With `strict_probe` a probe failure
/// aborts; otherwise the run is treated as not done and recorded in
/// `probe_failures`.
pub fn classify(
    run_list: &RunList,
    paths: &QsubPaths,
    probe: &dyn RunStatusProbe,
    store: &dyn TrackingStore,
    strict_probe: bool,
) -> Result<Reconciliation> {
    let tracked = load_tracked_states(run_list, store)?;
    let tracked_finished: HashSet<String> = tracked
        .iter()
        .flat_map(TrackedArrayState::tracked_finished_run_ids)
        .collect();

    let run_ids = run_list.run_ids();
    let mut classification = Classification::default();
    for run_id in &run_ids {
        let run_path = paths.run_dir(run_id);
        let present = run_path.is_dir();
        let done = present
            && probe_run(probe, &run_path, run_id, strict_probe, &mut classification)?;
        let class = classify_run(present, done, tracked_finished.contains(run_id));
        debug!(run = %run_id, class = class.label(), "classified");
        classification.push(class, run_id.as_str());
    }

    let errors = validate_partition(&run_ids, &classification);
    if !errors.is_empty() {
        return Err(anyhow!(
            "classification is not a partition of declared runs:\n- {}",
            errors.join("\n- ")
        ));
    }
    Ok(Reconciliation {
        classification,
        tracked,
    })
}

fn probe_run(
    probe: &dyn RunStatusProbe,
    run_path: &Path,
    run_id: &str,
    strict_probe: bool,
    classification: &mut Classification,
) -> Result<bool> {
    match probe.is_run_done(run_path) {
        Ok(done) => Ok(done),
        Err(err) if !strict_probe => {
            warn!(run = %run_id, probe = probe.name(), error = %err, "treating run as unfinished");
            classification.probe_failures.push(run_id.to_string());
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Inputs of one diagnostics invocation.
#[derive(Debug, Clone)]
pub struct DiagnoseRequest {
    pub run_list_path: PathBuf,
    pub selection: ProbeSelection,
    pub config: DiagConfig,
    /// Overrides `config.out_dir`.
    pub out_dir: Option<PathBuf>,
    /// Run the repair pass after classification.
    pub patch: bool,
}

/// Everything a diagnostics invocation produced.
#[derive(Debug, Clone)]
pub struct DiagnoseOutcome {
    pub run_list: RunList,
    pub reconciliation: Reconciliation,
    pub artifacts: Vec<PathBuf>,
    /// Present when the repair pass ran.
    pub repairs: Option<Vec<ArrayRepairPlan>>,
}

/// Full pass: validate inputs, classify, write artifacts, optionally repair.
///
/// Every precondition (probe, run list, `dest_dir`, qsub directory, tracking
/// files) is checked before any artifact is written.
pub fn diagnose(
    request: &DiagnoseRequest,
    registry: &mut ProbeRegistry,
) -> Result<DiagnoseOutcome> {
    let config = &request.config;
    let probe = request
        .selection
        .resolve(registry, config)
        .context("select done predicate")?;

    let source_name = request.run_list_path.display().to_string();
    if !request.run_list_path.is_file() {
        return Err(DiagError::missing("run list", &request.run_list_path).into());
    }
    let text = fs::read_to_string(&request.run_list_path)
        .map_err(|err| DiagError::io(&request.run_list_path, err))?;
    let run_list = parse_run_list(&source_name, &text)?;
    info!(
        arrays = run_list.arrays.len(),
        runs = run_list.run_ids().len(),
        "run list parsed"
    );

    let dest_dir = run_list.dest_dir(&source_name)?;
    let paths = QsubPaths::new(dest_dir, &config.qsub_dir);
    if !paths.dest_dir.is_dir() {
        return Err(DiagError::missing("dest_dir", &paths.dest_dir).into());
    }
    if !paths.qsub_dir.is_dir() {
        return Err(DiagError::missing("qsub directory", &paths.qsub_dir).into());
    }
    let store = FsTrackingStore::new(paths.clone());

    let reconciliation = classify(
        &run_list,
        &paths,
        probe.as_ref(),
        &store,
        config.strict_probe,
    )?;

    let out_dir = request
        .out_dir
        .clone()
        .or_else(|| config.out_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let artifacts = write_artifacts(&out_dir, &reconciliation.classification)?;

    let repairs = if request.patch {
        Some(apply_repairs(&reconciliation, &store, &config.checkpoint_flag)?)
    } else {
        None
    };

    Ok(DiagnoseOutcome {
        run_list,
        reconciliation,
        artifacts,
        repairs,
    })
}
