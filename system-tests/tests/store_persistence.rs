// system-tests/tests/store_persistence.rs
// ============================================================================
// Module: Store Persistence Suite
// Description: Aggregates durable sessions across restarts tests into one binary.
// Purpose: Keep durable sessions across restarts coverage in one place.
// Dependencies: suites/*, helpers
// ============================================================================

//! ## Overview
//! Aggregates durable sessions across restarts system tests into one binary.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod helpers;

#[path = "suites/store_persistence.rs"]
mod store_persistence;
