// system-tests/tests/smoke.rs
// ============================================================================
// Module: Smoke Suite
// Description: Aggregates the end-to-end stream scenario tests into one binary.
// Purpose: Keep the end-to-end stream scenario coverage in one place.
// Dependencies: suites/*, helpers
// ============================================================================

//! ## Overview
//! Aggregates the end-to-end stream scenario system tests into one binary.

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

#[path = "suites/smoke.rs"]
mod smoke;
