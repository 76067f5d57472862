//! Stable exit codes for `qsub-diag`.

/// Diagnostics (and repair, if requested) completed.
pub const OK: i32 = 0;
/// Invalid configuration, template, or any other failure.
pub const INVALID: i32 = 1;
/// The run list or a tracking file could not be parsed.
pub const PARSE: i32 = 2;
/// A required file or directory is missing.
pub const MISSING_PATH: i32 = 3;
/// The requested done predicate is not registered.
pub const UNRESOLVED_PROBE: i32 = 4;
/// A run could not be probed and `strict_probe` is enabled.
pub const PROBE_READ: i32 = 5;
