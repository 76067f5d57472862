//! Partition invariant for classification output.

use std::collections::HashMap;

use crate::core::classifier::Classification;
use crate::core::types::RunClass;

/// Check that `classification` partitions `expected` exactly:
/// - every expected run id is classified as often as it was declared
/// - no run id lands in two different classes
/// - no class contains a run id that was not declared
///
/// Overlapping declarations repeat a run id in `expected`; each repetition
/// must be classified, always into the same class.
pub fn validate_partition(expected: &[String], classification: &Classification) -> Vec<String> {
    let mut errors = Vec::new();
    let mut declared: HashMap<&str, usize> = HashMap::new();
    for run_id in expected {
        *declared.entry(run_id.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, (RunClass, usize)> = HashMap::new();
    for class in RunClass::ALL {
        for run_id in classification.get(class) {
            if !declared.contains_key(run_id.as_str()) {
                errors.push(format!("{}: '{}' was never declared", class.label(), run_id));
                continue;
            }
            let entry = seen.entry(run_id.as_str()).or_insert((class, 0));
            if entry.0 != class {
                errors.push(format!(
                    "'{}' classified as both {} and {}",
                    run_id,
                    entry.0.label(),
                    class.label()
                ));
            }
            entry.1 += 1;
        }
    }

    for run_id in expected {
        let want = declared[run_id.as_str()];
        match seen.get(run_id.as_str()) {
            None => errors.push(format!("'{}' is not classified", run_id)),
            Some((_, got)) if *got != want => errors.push(format!(
                "'{}' declared {} time(s) but classified {} time(s)",
                run_id, want, got
            )),
            Some(_) => {}
        }
    }
    errors.sort();
    errors.dedup();
    errors
}
