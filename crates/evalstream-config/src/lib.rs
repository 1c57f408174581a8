// crates/evalstream-config/src/lib.rs
// ============================================================================
// Module: Evalstream Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for evalstream.toml semantics.
// Dependencies: evalstream-engine, evalstream-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `evalstream-config` defines the configuration model for the evalstream
//! server. Validation is strict and fails closed: an unsafe combination of
//! bind address and identity settings is rejected rather than tolerated.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
