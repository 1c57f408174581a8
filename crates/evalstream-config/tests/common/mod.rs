// crates/evalstream-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for evalstream config tests.
// Purpose: Build baseline configs and assert on validation failures.
// ============================================================================

//! Shared helpers for config integration tests.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use evalstream_config::ConfigError;
use evalstream_config::EvalStreamConfig;
use evalstream_config::IdentityMode;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses an empty document, yielding every default.
pub fn minimal_config() -> Result<EvalStreamConfig, String> {
    EvalStreamConfig::from_toml("").map_err(|err| err.to_string())
}

/// Baseline config with header identity and owner enforcement.
pub fn owned_config() -> Result<EvalStreamConfig, String> {
    let mut config = minimal_config()?;
    config.server.identity.mode = IdentityMode::Header;
    config.server.ownership.require_owner = true;
    config.server.ownership.enforce_access = true;
    Ok(config)
}

/// Asserts that `result` is an error whose message contains `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Ok(()) => Err(format!("expected error containing {needle:?}, got Ok")),
        Err(err) => {
            let message = err.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("expected error containing {needle:?}, got {message:?}"))
            }
        }
    }
}
