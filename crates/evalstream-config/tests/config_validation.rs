// crates/evalstream-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Fail-closed validation of evalstream configuration.
// Purpose: Ensure unsafe or inconsistent configs are rejected.
// ============================================================================

//! Validation tests for server, store, dataset, and window settings.

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
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::path::PathBuf;

use common::TestResult;
use common::assert_invalid;
use common::minimal_config;
use common::owned_config;
use evalstream_config::EvalStreamConfig;
use evalstream_config::IdentityMode;
use evalstream_config::SessionStoreType;
use evalstream_store_sqlite::SqliteStoreMode;

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn empty_config_is_valid_loopback_memory() -> TestResult {
    let config = minimal_config()?;
    config.validate().map_err(|err| err.to_string())?;
    assert_eq!(config.server.bind, "127.0.0.1:8000");
    assert_eq!(config.server.identity.mode, IdentityMode::Anonymous);
    assert_eq!(config.server.identity.header, "x-user-id");
    assert!(config.server.audit.enabled);
    assert_eq!(config.session_store.store_type, SessionStoreType::Memory);
    assert!(config.session_store.sqlite().is_none());
    assert_eq!(config.datasets.allowed.len(), 7);
    assert_eq!(config.defaults.n_seq_data, 3);
    Ok(())
}

#[test]
fn unknown_identity_mode_fails_to_parse() {
    let result = EvalStreamConfig::from_toml("[server.identity]\nmode = \"oauth\"\n");
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Server
// ============================================================================

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "localhost-ish".to_string();
    assert_invalid(config.validate(), "invalid server.bind")
}

#[test]
fn zero_body_limit_is_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes")
}

#[test]
fn non_loopback_bind_requires_ownership() -> TestResult {
    let mut config = minimal_config()?;
    config.server.bind = "0.0.0.0:8000".to_string();
    assert_invalid(config.validate(), "non-loopback")?;

    let mut config = owned_config()?;
    config.server.bind = "0.0.0.0:8000".to_string();
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn ownership_requires_identity() -> TestResult {
    let mut config = minimal_config()?;
    config.server.ownership.enforce_access = true;
    assert_invalid(config.validate(), "non-anonymous identity")
}

#[test]
fn header_mode_requires_valid_header_name() -> TestResult {
    let mut config = owned_config()?;
    config.server.identity.header = "bad header".to_string();
    assert_invalid(config.validate(), "not a valid header name")?;
    config.server.identity.header = "   ".to_string();
    assert_invalid(config.validate(), "not a valid header name")
}

#[test]
fn static_mode_requires_valid_user_id() -> TestResult {
    let mut config = owned_config()?;
    config.server.identity.mode = IdentityMode::Static;
    assert_invalid(config.validate(), "requires user_id")?;
    config.server.identity.user_id = Some(String::new());
    assert_invalid(config.validate(), "server.identity.user_id")?;
    config.server.identity.user_id = Some("alice".to_string());
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn empty_audit_path_is_rejected() -> TestResult {
    let mut config = minimal_config()?;
    config.server.audit.path = Some("  ".to_string());
    assert_invalid(config.validate(), "server.audit.path")
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = minimal_config()?;
    config.session_store.path = Some(PathBuf::from("store.db"));
    assert_invalid(config.validate(), "must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = minimal_config()?;
    config.session_store.store_type = SessionStoreType::Sqlite;
    assert_invalid(config.validate(), "requires path")?;
    config.session_store.path = Some(PathBuf::from("a".repeat(300)));
    assert_invalid(config.validate(), "path component too long")
}

#[test]
fn sqlite_store_builds_backend_config() -> TestResult {
    let config = EvalStreamConfig::from_toml(
        "[session_store]\ntype = \"sqlite\"\npath = \"data/streams.db\"\njournal_mode = \"delete\"\n",
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let sqlite = config.session_store.sqlite().ok_or("missing sqlite config")?;
    assert_eq!(sqlite.path, PathBuf::from("data/streams.db"));
    assert_eq!(sqlite.journal_mode, SqliteStoreMode::Delete);
    assert_eq!(sqlite.busy_timeout_ms, 5_000);
    Ok(())
}

// ============================================================================
// SECTION: Datasets and Defaults
// ============================================================================

#[test]
fn dataset_ids_must_be_file_safe() -> TestResult {
    let mut config = minimal_config()?;
    config.datasets.allowed = vec!["../etc/passwd".to_string()];
    assert_invalid(config.validate(), "not a valid dataset id")?;
    config.datasets.allowed = Vec::new();
    assert_invalid(config.validate(), "must not be empty")
}

#[test]
fn window_defaults_must_be_positive() -> TestResult {
    let mut config = minimal_config()?;
    config.defaults.window_size = 0;
    assert_invalid(config.validate(), "window_size")?;
    let mut config = minimal_config()?;
    config.defaults.n_seq_data = 0;
    assert_invalid(config.validate(), "n_seq_data")
}
