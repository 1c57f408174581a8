// crates/evalstream-config/src/config.rs
// ============================================================================
// Module: Evalstream Configuration
// Description: Configuration loading and validation for the evalstream server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: evalstream-core, evalstream-engine, evalstream-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid loopback-only,
//! in-memory configuration. Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use evalstream_core::UserId;
use evalstream_engine::KNOWN_DATASETS;
use evalstream_store_sqlite::SqliteStoreConfig;
use evalstream_store_sqlite::SqliteStoreMode;
use evalstream_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "evalstream.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "EVALSTREAM_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8000";
/// Default maximum request body size (16 MiB).
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Default identity header.
const DEFAULT_IDENTITY_HEADER: &str = "x-user-id";
/// Default busy timeout (ms).
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default background cut-off (2014-08-01 UTC).
const DEFAULT_BACKGROUND_T: i64 = 1_406_851_200;
/// Default window length (300 days).
const DEFAULT_WINDOW_SIZE: i64 = 25_920_000;
/// Default masked rows per user per window.
const DEFAULT_N_SEQ_DATA: usize = 3;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the evalstream server.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvalStreamConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Session store configuration.
    #[serde(default)]
    pub session_store: SessionStoreConfig,
    /// Dataset catalog configuration.
    #[serde(default)]
    pub datasets: DatasetsConfig,
    /// Window parameters applied when a create request omits them.
    #[serde(default)]
    pub defaults: WindowDefaults,
}

impl EvalStreamConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.session_store.validate()?;
        self.datasets.validate()?;
        self.defaults.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Caller identity resolution.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Ownership recording and enforcement.
    #[serde(default)]
    pub ownership: OwnershipConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            identity: IdentityConfig::default(),
            ownership: OwnershipConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server.bind address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.identity.validate()?;
        self.audit.validate()?;
        let anonymous = self.identity.mode == IdentityMode::Anonymous;
        if anonymous && (self.ownership.require_owner || self.ownership.enforce_access) {
            return Err(ConfigError::Invalid(
                "server.ownership requires a non-anonymous identity mode".to_string(),
            ));
        }
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && (anonymous || !self.ownership.require_owner) {
            return Err(ConfigError::Invalid(
                "non-loopback bind requires require_owner and a non-anonymous identity mode"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// How the server determines the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// No current user.
    #[default]
    Anonymous,
    /// User id read from a request header.
    Header,
    /// Every request runs as one configured user.
    Static,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Identity mode.
    #[serde(default)]
    pub mode: IdentityMode,
    /// Header carrying the user id in header mode.
    #[serde(default = "default_identity_header")]
    pub header: String,
    /// User id for static mode.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::default(),
            header: default_identity_header(),
            user_id: None,
        }
    }
}

impl IdentityConfig {
    /// Validates identity configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.mode {
            IdentityMode::Anonymous => Ok(()),
            IdentityMode::Header => {
                let header = self.header.trim();
                if header.is_empty()
                    || !header.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
                {
                    return Err(ConfigError::Invalid(format!(
                        "server.identity.header is not a valid header name: {header}"
                    )));
                }
                Ok(())
            }
            IdentityMode::Static => {
                let user_id = self.user_id.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("static identity requires user_id".to_string())
                })?;
                UserId::new(user_id).map_err(|err| {
                    ConfigError::Invalid(format!("server.identity.user_id: {err}"))
                })?;
                Ok(())
            }
        }
    }
}

/// Ownership configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OwnershipConfig {
    /// Reject stream creation without a current user.
    #[serde(default)]
    pub require_owner: bool,
    /// Reject stream-scoped operations from non-owners.
    #[serde(default)]
    pub enforce_access: bool,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("server.audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Session store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: SessionStoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            store_type: SessionStoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl SessionStoreConfig {
    /// Returns the `SQLite` store config for the sqlite backend.
    #[must_use]
    pub fn sqlite(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (SessionStoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates session store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            SessionStoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "memory session_store must not set path".to_string(),
                    ));
                }
                Ok(())
            }
            SessionStoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite session_store requires path".to_string())
                })?;
                validate_path_string("session_store.path", &path.to_string_lossy())
            }
        }
    }
}

// ============================================================================
// SECTION: Datasets
// ============================================================================

/// Dataset catalog configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsConfig {
    /// Directory of `<dataset_id>.jsonl` files. Synthetic data when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Dataset ids accepted by stream creation.
    #[serde(default = "default_allowed_datasets")]
    pub allowed: Vec<String>,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            allowed: default_allowed_datasets(),
        }
    }
}

impl DatasetsConfig {
    /// Validates dataset configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.dir {
            validate_path_string("datasets.dir", &dir.to_string_lossy())?;
        }
        if self.allowed.is_empty() {
            return Err(ConfigError::Invalid("datasets.allowed must not be empty".to_string()));
        }
        for dataset_id in &self.allowed {
            let valid = !dataset_id.is_empty()
                && dataset_id.len() <= MAX_PATH_COMPONENT_LENGTH
                && dataset_id
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "datasets.allowed entry is not a valid dataset id: {dataset_id}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Window Defaults
// ============================================================================

/// Sliding-window parameters applied when a create request omits them.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WindowDefaults {
    /// Background cut-off timestamp.
    #[serde(default = "default_background_t")]
    pub background_t: i64,
    /// Window length in seconds.
    #[serde(default = "default_window_size")]
    pub window_size: i64,
    /// Masked rows per user per window.
    #[serde(default = "default_n_seq_data")]
    pub n_seq_data: usize,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            background_t: default_background_t(),
            window_size: default_window_size(),
            n_seq_data: default_n_seq_data(),
        }
    }
}

impl WindowDefaults {
    /// Validates window defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size <= 0 {
            return Err(ConfigError::Invalid(
                "defaults.window_size must be greater than zero".to_string(),
            ));
        }
        if self.n_seq_data == 0 {
            return Err(ConfigError::Invalid(
                "defaults.n_seq_data must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default identity header.
fn default_identity_header() -> String {
    DEFAULT_IDENTITY_HEADER.to_string()
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Default store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Built-in dataset names.
fn default_allowed_datasets() -> Vec<String> {
    KNOWN_DATASETS.iter().map(ToString::to_string).collect()
}

/// Default background cut-off.
const fn default_background_t() -> i64 {
    DEFAULT_BACKGROUND_T
}

/// Default window length.
const fn default_window_size() -> i64 {
    DEFAULT_WINDOW_SIZE
}

/// Default masked rows per user.
const fn default_n_seq_data() -> usize {
    DEFAULT_N_SEQ_DATA
}
