//! Diagnostics and repair for `dist_qsub` run arrays.
//!
//! `dist_qsub` submits simulation runs in numbered arrays and records, per
//! array, which indices it is done handling. This crate compares that
//! bookkeeping against the run directories on disk, sorts every declared run
//! into one of five classes, and can rewrite the bookkeeping so stalled or
//! lost runs are picked up again. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (run-list parsing, classification,
//!   repair planning). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, tracking files, done
//!   predicates, artifacts). Behind traits where tests need substitutes.
//!
//! Orchestration modules ([`reconcile`], [`patch`]) coordinate core logic
//! with I/O to implement the CLI.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod patch;
pub mod reconcile;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
