//! Diagnostic tracing for `qsub-diag`.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: progress and warnings via `RUST_LOG`, output
//!   to stderr. Not part of the product output.
//!
//! - **Artifacts (`io/diag_report`)**: the `.diag` files and the stdout
//!   report. Always produced, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, which still shows
/// probe failures and arrays that need resubmission.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=qsub_diag=debug qsub-diag runs.txt --done-str "Run finished"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
