// system-tests/src/lib.rs
// ============================================================================
// Module: Evalstream System Tests Library
// Description: Shared configuration for system test scenarios.
// Purpose: Provide common utilities for evalstream system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the evalstream system-test
//! binaries in `system-tests/tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
