// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for evalstream system-tests.
// Purpose: Provide server harnesses, an HTTP client, and readiness polling.
// Dependencies: system-tests, evalstream-server, reqwest
// ============================================================================

//! ## Overview
//! Shared helpers for evalstream system-tests. Every suite spawns a real
//! server on a loopback listener and talks to it over HTTP.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod client;
pub mod harness;
pub mod readiness;
