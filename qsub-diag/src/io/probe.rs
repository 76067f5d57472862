//! Done predicates: decide whether a run directory holds a finished run.
//!
//! Two strategies exist. [`LogMarkerProbe`] searches the run log for a marker
//! string. Delegated predicates are Rust implementations of
//! [`RunStatusProbe`] registered by name in a [`ProbeRegistry`]; the CLI
//! resolves `--done-fn <name>` against it. Nothing is ever evaluated from
//! text.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::DiagError;
use crate::io::config::{DiagConfig, FitnessCsvConfig};

/// Opaque "is this run done" query.
pub trait RunStatusProbe {
    /// Short name for logs and reports.
    fn name(&self) -> &str;

    fn is_run_done(&self, run_path: &Path) -> Result<bool, DiagError>;
}

/// Done iff any trimmed line of `run_path/<log_file>` contains `marker`.
#[derive(Debug, Clone)]
pub struct LogMarkerProbe {
    marker: String,
    log_file: String,
}

impl LogMarkerProbe {
    pub fn new(marker: impl Into<String>, log_file: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            log_file: log_file.into(),
        }
    }
}

impl RunStatusProbe for LogMarkerProbe {
    fn name(&self) -> &str {
        "log_marker"
    }

    fn is_run_done(&self, run_path: &Path) -> Result<bool, DiagError> {
        let log_path = run_path.join(&self.log_file);
        let contents = fs::read_to_string(&log_path).map_err(|err| DiagError::ProbeRead {
            run_path: run_path.to_path_buf(),
            message: format!("read {}: {err}", log_path.display()),
        })?;
        Ok(contents
            .lines()
            .any(|line| line.trim().contains(self.marker.as_str())))
    }
}

/// Done iff the CSV at `run_path/<path>` has a row whose `column` equals
/// `target`.
#[derive(Debug, Clone)]
pub struct FitnessCsvProbe {
    config: FitnessCsvConfig,
}

impl FitnessCsvProbe {
    pub const NAME: &'static str = "fitness_csv";

    pub fn new(config: FitnessCsvConfig) -> Self {
        Self { config }
    }
}

impl RunStatusProbe for FitnessCsvProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_run_done(&self, run_path: &Path) -> Result<bool, DiagError> {
        let csv_path = run_path.join(&self.config.path);
        let probe_err = |message: String| DiagError::ProbeRead {
            run_path: run_path.to_path_buf(),
            message,
        };
        let contents = fs::read_to_string(&csv_path)
            .map_err(|err| probe_err(format!("read {}: {err}", csv_path.display())))?;

        let mut lines = contents.trim().lines();
        let header = lines
            .next()
            .ok_or_else(|| probe_err(format!("{} is empty", csv_path.display())))?;
        let column = header
            .split(',')
            .position(|name| name.trim() == self.config.column)
            .ok_or_else(|| {
                probe_err(format!(
                    "{} has no '{}' column",
                    csv_path.display(),
                    self.config.column
                ))
            })?;

        Ok(lines.any(|row| {
            row.split(',')
                .nth(column)
                .is_some_and(|value| value == self.config.target)
        }))
    }
}

/// Named delegated predicates.
#[derive(Default)]
pub struct ProbeRegistry {
    probes: BTreeMap<String, Box<dyn RunStatusProbe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the predicates shipped with the tool.
    pub fn with_builtins(config: &DiagConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            FitnessCsvProbe::NAME,
            FitnessCsvProbe::new(config.probe.fitness_csv.clone()),
        );
        registry
    }

    /// Register `probe` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, probe: impl RunStatusProbe + 'static) {
        self.probes.insert(name.into(), Box::new(probe));
    }

    pub fn names(&self) -> Vec<&str> {
        self.probes.keys().map(String::as_str).collect()
    }

    /// Take the predicate registered under `name` out of the registry.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn RunStatusProbe>, DiagError> {
        let available = self.names().join(", ");
        self.probes
            .remove(name)
            .ok_or_else(|| DiagError::ExternalResolution {
                name: name.to_string(),
                available,
            })
    }
}

/// How the caller asked to decide whether runs are done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSelection {
    /// `--done-str`: marker searched for in the run log.
    pub done_str: Option<String>,
    /// `--done-fn`: registered delegated predicate; wins over `done_str`.
    pub done_fn: Option<String>,
}

impl ProbeSelection {
    /// Pick the active strategy. Delegated predicates take precedence.
    pub fn resolve(
        &self,
        registry: &mut ProbeRegistry,
        config: &DiagConfig,
    ) -> Result<Box<dyn RunStatusProbe>, DiagError> {
        if let Some(name) = &self.done_fn {
            debug!(name = %name, "resolving delegated done predicate");
            return registry.take(name);
        }
        if let Some(marker) = &self.done_str {
            debug!(marker = %marker, log = %config.run_log, "using log marker predicate");
            return Ok(Box::new(LogMarkerProbe::new(
                marker.clone(),
                config.run_log.clone(),
            )));
        }
        Err(DiagError::Config(
            "no method for determining whether a run is finished (use --done-str or --done-fn)"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysDone;

    impl RunStatusProbe for AlwaysDone {
        fn name(&self) -> &str {
            "always"
        }

        fn is_run_done(&self, _run_path: &Path) -> Result<bool, DiagError> {
            Ok(true)
        }
    }

    #[test]
    fn log_marker_matches_substring_of_trimmed_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("run.log"),
            "update 10\n   Run finished: update 50000   \n",
        )
        .expect("write log");
        let probe = LogMarkerProbe::new("finished: update", "run.log");
        assert!(probe.is_run_done(temp.path()).expect("probe"));

        let probe = LogMarkerProbe::new("segfault", "run.log");
        assert!(!probe.is_run_done(temp.path()).expect("probe"));
    }

    #[test]
    fn log_marker_missing_log_is_probe_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let probe = LogMarkerProbe::new("done", "run.log");
        let err = probe.is_run_done(temp.path()).unwrap_err();
        assert!(matches!(err, DiagError::ProbeRead { .. }));
        assert!(err.to_string().contains("run.log"));
    }

    #[test]
    fn fitness_csv_finds_target_update() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("output")).expect("mkdir");
        let csv = temp.path().join("output/fitness.csv");
        let probe = FitnessCsvProbe::new(FitnessCsvConfig::default());

        fs::write(&csv, "update, max_fitness\n0,1.0\n49999,2.0\n").expect("write");
        assert!(!probe.is_run_done(temp.path()).expect("probe"));

        fs::write(&csv, "update, max_fitness\n0,1.0\n50000,2.5\n").expect("write");
        assert!(probe.is_run_done(temp.path()).expect("probe"));
    }

    #[test]
    fn fitness_csv_without_column_is_probe_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("output")).expect("mkdir");
        fs::write(temp.path().join("output/fitness.csv"), "gen,fit\n1,2\n").expect("write");
        let probe = FitnessCsvProbe::new(FitnessCsvConfig::default());
        let err = probe.is_run_done(temp.path()).unwrap_err();
        assert!(err.to_string().contains("no 'update' column"));
    }

    #[test]
    fn delegated_predicate_wins_over_marker() {
        let mut registry = ProbeRegistry::new();
        registry.register("always", AlwaysDone);
        let selection = ProbeSelection {
            done_str: Some("done".to_string()),
            done_fn: Some("always".to_string()),
        };
        let probe = selection
            .resolve(&mut registry, &DiagConfig::default())
            .expect("resolve");
        assert_eq!(probe.name(), "always");
    }

    #[test]
    fn unknown_delegated_predicate_lists_registered_names() {
        let mut registry = ProbeRegistry::with_builtins(&DiagConfig::default());
        let selection = ProbeSelection {
            done_str: None,
            done_fn: Some("signalgp_ckdone".to_string()),
        };
        let err = selection
            .resolve(&mut registry, &DiagConfig::default())
            .err()
            .expect("unresolved");
        assert!(matches!(err, DiagError::ExternalResolution { .. }));
        assert!(err.to_string().contains("fitness_csv"));
    }

    #[test]
    fn no_strategy_is_config_error() {
        let mut registry = ProbeRegistry::new();
        let err = ProbeSelection::default()
            .resolve(&mut registry, &DiagConfig::default())
            .err()
            .expect("no strategy");
        assert!(matches!(err, DiagError::Config(_)));
    }
}
