//! I/O helpers for diagnostics and repair passes.

pub mod config;
pub mod diag_report;
pub mod paths;
pub mod probe;
pub mod tracking_store;
