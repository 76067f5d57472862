//! Deterministic, pure logic shared by the diagnostics passes.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod invariants;
pub mod repair;
pub mod run_list;
pub mod types;
