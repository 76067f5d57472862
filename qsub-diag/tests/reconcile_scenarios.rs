//! End-to-end scenarios for the diagnostics and repair passes.
//!
//! Each test lays out a `dist_qsub` destination directory in a tempdir, runs
//! `diagnose` through the library API, and checks the `.diag` artifacts and
//! rewritten bookkeeping files.

use qsub_diag::core::types::ArrayState;
use qsub_diag::io::config::DiagConfig;
use qsub_diag::io::probe::{ProbeRegistry, ProbeSelection};
use qsub_diag::reconcile::{DiagnoseOutcome, DiagnoseRequest, diagnose};
use qsub_diag::test_support::{DONE_MARKER, DistFixture};

const WIDGET: &str = "# widget sweep\nset dest_dir {dest}\n1..3 widget\n";
const TEMPLATE: &str = "#!/bin/bash\n#PBS -t 0-2\nexport CPR=0\n./run.sh $CPR\n";

fn run(fixture: &DistFixture, patch: bool) -> DiagnoseOutcome {
    run_with(fixture, WIDGET, patch).expect("diagnose")
}

fn run_with(
    fixture: &DistFixture,
    run_list: &str,
    patch: bool,
) -> anyhow::Result<DiagnoseOutcome> {
    let run_list_path = fixture.write_run_list(run_list).expect("run list");
    let request = DiagnoseRequest {
        run_list_path,
        selection: ProbeSelection {
            done_str: Some(DONE_MARKER.to_string()),
            done_fn: None,
        },
        config: DiagConfig::default(),
        out_dir: Some(fixture.out_dir()),
        patch,
    };
    diagnose(&request, &mut ProbeRegistry::new())
}

/// Two runs on disk (one finished), one missing; the wrapper tracks the
/// finished one.
#[test]
fn finished_run_tracked_as_done() {
    let fixture = DistFixture::new().expect("fixture");
    fixture.add_finished_run("widget_1").expect("run");
    fixture.add_run("widget_2").expect("run");
    fixture.write_tracking("widget_1..3", &[0]).expect("tracking");

    let outcome = run(&fixture, false);
    let classification = &outcome.reconciliation.classification;
    assert_eq!(classification.missing, vec!["widget_3"]);
    assert_eq!(classification.finished_dropped, vec!["widget_1"]);
    assert_eq!(classification.unfinished_tracked, vec!["widget_2"]);
    assert!(classification.finished_tracked.is_empty());
    assert!(classification.unfinished_dropped.is_empty());

    assert_eq!(fixture.read_artifact("MISSING.diag").expect("read"), "widget_3");
    assert_eq!(fixture.read_artifact("FINISHED.diag").expect("read"), "widget_1");
    assert_eq!(
        fixture.read_artifact("UNFINISHED_TRACKED.diag").expect("read"),
        "widget_2"
    );
    assert_eq!(fixture.read_artifact("UNFINISHED_DROPPED.diag").expect("read"), "");
    assert!(!fixture.out_dir().join("FINISHED_TRACKED.diag").exists());
}

/// The wrapper claims the unfinished run and ignores the finished one.
#[test]
fn wrapper_disagrees_in_both_directions() {
    let fixture = DistFixture::new().expect("fixture");
    fixture.add_finished_run("widget_1").expect("run");
    fixture.add_run("widget_2").expect("run");
    fixture.write_tracking("widget_1..3", &[1]).expect("tracking");

    let outcome = run(&fixture, false);
    let classification = &outcome.reconciliation.classification;
    assert_eq!(classification.finished_tracked, vec!["widget_1"]);
    assert_eq!(classification.unfinished_dropped, vec!["widget_2"]);
    assert_eq!(classification.missing, vec!["widget_3"]);
    assert_eq!(
        fixture.read_artifact("FINISHED_TRACKED.diag").expect("read"),
        "widget_1"
    );
}

#[test]
fn classification_is_idempotent() {
    let fixture = DistFixture::new().expect("fixture");
    fixture.add_finished_run("widget_1").expect("run");
    fixture.add_run("widget_3").expect("run");
    fixture.write_tracking("widget_1..3", &[2]).expect("tracking");

    let first = run(&fixture, false);
    let second = run(&fixture, false);
    assert_eq!(first.reconciliation, second.reconciliation);
}

/// Every index handled by the wrapper, nothing finished: the tracking file is
/// emptied and the template switched to checkpoint recovery.
#[test]
fn dead_array_is_prepared_for_resubmission() {
    let fixture = DistFixture::new().expect("fixture");
    for run_id in ["widget_1", "widget_2", "widget_3"] {
        fixture.add_run(run_id).expect("run");
    }
    fixture.write_tracking("widget_1..3", &[0, 1, 2]).expect("tracking");
    fixture.write_template("widget_1..3", TEMPLATE).expect("template");

    let outcome = run(&fixture, true);
    let repairs = outcome.repairs.expect("repairs ran");
    assert_eq!(repairs[0].state, ArrayState::DeadWithStragglers);

    assert_eq!(fixture.read_tracking("widget_1..3").expect("read"), "");
    assert_eq!(
        fixture.read_template("widget_1..3").expect("read"),
        TEMPLATE.replacen("CPR=0", "CPR=1", 1)
    );
}

/// False "done" entries are cleared, true ones survive, and the array stays
/// with the wrapper.
#[test]
fn repair_keeps_only_finished_offsets() {
    let fixture = DistFixture::new().expect("fixture");
    fixture.add_finished_run("widget_1").expect("run");
    fixture.add_run("widget_2").expect("run");
    fixture.write_tracking("widget_1..3", &[1]).expect("tracking");
    fixture.write_template("widget_1..3", TEMPLATE).expect("template");

    let outcome = run(&fixture, true);
    let repairs = outcome.repairs.expect("repairs ran");
    assert_eq!(repairs[0].state, ArrayState::StillActive);
    assert_eq!(repairs[0].cleared_offsets, vec![1]);

    assert_eq!(fixture.read_tracking("widget_1..3").expect("read"), "0\n");
    assert_eq!(fixture.read_template("widget_1..3").expect("read"), TEMPLATE);

    let rerun = run(&fixture, false);
    assert_eq!(
        rerun.reconciliation.classification.finished_dropped,
        vec!["widget_1"]
    );
    assert!(rerun.reconciliation.classification.unfinished_dropped.is_empty());
}

#[test]
fn finished_array_files_are_untouched() {
    let fixture = DistFixture::new().expect("fixture");
    for run_id in ["widget_1", "widget_2", "widget_3"] {
        fixture.add_finished_run(run_id).expect("run");
    }
    // Offsets deliberately unsorted: an untouched file keeps its bytes.
    std::fs::write(fixture.tracking_path("widget_1..3"), "2\n0\n1\n").expect("tracking");
    fixture.write_template("widget_1..3", TEMPLATE).expect("template");

    let outcome = run(&fixture, true);
    assert_eq!(
        outcome.repairs.expect("repairs ran")[0].state,
        ArrayState::AllFinished
    );
    assert_eq!(fixture.read_tracking("widget_1..3").expect("read"), "2\n0\n1\n");
    assert_eq!(fixture.read_template("widget_1..3").expect("read"), TEMPLATE);
}

#[test]
fn template_without_flag_is_reported_with_its_path() {
    let fixture = DistFixture::new().expect("fixture");
    for run_id in ["widget_1", "widget_2", "widget_3"] {
        fixture.add_run(run_id).expect("run");
    }
    fixture.write_tracking("widget_1..3", &[0, 1, 2]).expect("tracking");
    fixture
        .write_template("widget_1..3", "export CPR=1\n")
        .expect("template");

    let err = run_with(&fixture, WIDGET, true).unwrap_err();
    let template_path = fixture.template_path("widget_1..3");
    assert!(format!("{err:#}").contains(&template_path.display().to_string()));
    assert_eq!(fixture.read_tracking("widget_1..3").expect("read"), "0\n1\n2\n");
}

/// Declaring the same array twice shares one tracking file and template.
#[test]
fn repeated_declaration_flips_template_once() {
    let fixture = DistFixture::new().expect("fixture");
    for run_id in ["w_1", "w_2"] {
        fixture.add_run(run_id).expect("run");
    }
    fixture.write_tracking("w_1..2", &[0, 1]).expect("tracking");
    fixture.write_template("w_1..2", TEMPLATE).expect("template");

    let outcome = run_with(&fixture, "set dest_dir {dest}\n1..2 w\n1..2 w\n", true)
        .expect("diagnose");
    assert_eq!(outcome.repairs.expect("repairs ran").len(), 1);
    assert_eq!(fixture.read_tracking("w_1..2").expect("read"), "");
    assert_eq!(
        fixture.read_template("w_1..2").expect("read"),
        TEMPLATE.replacen("CPR=0", "CPR=1", 1)
    );
}
