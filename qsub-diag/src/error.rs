//! Failure taxonomy for diagnostics and repair passes.
//!
//! Every variant names the offending path or identifier so the CLI can print
//! a single actionable line. `main` downcasts to [`DiagError`] to choose an
//! exit code; everything else is reported as a generic failure.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum DiagError {
    /// Malformed run-list or tracking file content.
    #[error("{source_name}:{line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// The run list lacks a required `set` assignment.
    #[error("{source_name}: no '{key}' setting")]
    MissingSetting {
        source_name: String,
        key: &'static str,
    },

    /// A required file or directory does not exist.
    #[error("could not find {what} ({})", path.display())]
    MissingPath { what: &'static str, path: PathBuf },

    /// A delegated done-predicate name is not registered.
    #[error("unknown done predicate '{name}' (registered: {available})")]
    ExternalResolution { name: String, available: String },

    /// The done predicate could not inspect an existing run directory.
    #[error("cannot determine whether {} is done: {message}", run_path.display())]
    ProbeRead { run_path: PathBuf, message: String },

    /// A resubmission template cannot be prepared.
    #[error("template {}: {message}", path.display())]
    Template { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiagError {
    pub fn parse(source_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn missing(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::MissingPath {
            what,
            path: path.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable process exit code for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse { .. } | Self::MissingSetting { .. } => exit_codes::PARSE,
            Self::MissingPath { .. } => exit_codes::MISSING_PATH,
            Self::ExternalResolution { .. } => exit_codes::UNRESOLVED_PROBE,
            Self::ProbeRead { .. } => exit_codes::PROBE_READ,
            Self::Template { .. } | Self::Config(_) | Self::Io { .. } => exit_codes::INVALID,
        }
    }
}

/// Map an `anyhow` chain to an exit code, looking for the first [`DiagError`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DiagError>())
        .map_or(exit_codes::INVALID, DiagError::exit_code)
}
