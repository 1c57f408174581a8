// crates/evalstream-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Session Store
// Description: Durable SessionStore and OwnershipMap backed by SQLite.
// Purpose: Persist frozen session blobs with integrity hashes.
// Dependencies: evalstream-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteSessionStore`] keeps one row per evaluation stream holding the
//! opaque frozen blob, its dataset id, its optional owner, and a SHA-256 hash
//! of the blob. Ownership pairs live in a separate table so the ownership map
//! can answer listings without touching blobs.
//!
//! Reads verify the stored hash and fail closed on mismatch. Blob contents
//! are never inspected or queried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use evalstream_core::OwnershipMap;
use evalstream_core::SessionStore;
use evalstream_core::StateBlob;
use evalstream_core::StoreError;
use evalstream_core::StoredSession;
use evalstream_core::StreamId;
use evalstream_core::UserId;
use evalstream_core::hashing::DEFAULT_HASH_ALGORITHM;
use evalstream_core::hashing::HashAlgorithm;
use evalstream_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum frozen session size accepted by the store.
pub const MAX_STATE_BYTES: usize = 64 * 1024 * 1024;
/// Fresh identifiers drawn before an insert gives up on collisions.
const MAX_ID_ATTEMPTS: usize = 8;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` session store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Returns a config for `path` with default tuning.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages never embed blob contents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Blob exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "state_blob exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps a driver error to a store error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed session store and ownership map.
///
/// # Invariants
/// - Reads verify stored hashes before returning a blob.
/// - Connection access is serialized through a mutex.
#[derive(Clone)]
pub struct SqliteSessionStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Opens an `SQLite`-backed session store, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or holds an unsupported schema version.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("sqlite mutex poisoned".to_string()))
    }

    /// Inserts a new row under a fresh identifier.
    fn insert_session(
        &self,
        blob: &StateBlob,
        owner_id: Option<&UserId>,
        dataset_id: &str,
    ) -> Result<StreamId, SqliteStoreError> {
        ensure_within_limit(blob.len())?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, blob.as_bytes());
        let now = unix_millis();
        let guard = self.lock()?;
        for _ in 0 .. MAX_ID_ATTEMPTS {
            let id = StreamId::new_v4();
            let inserted = guard.execute(
                "INSERT INTO streams (stream_id, owner_id, dataset_id, state_blob, state_hash, \
                 hash_algorithm, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id.to_string(),
                    owner_id.map(UserId::as_str),
                    dataset_id,
                    blob.as_bytes(),
                    digest.value,
                    digest.algorithm.label(),
                    now
                ],
            );
            match inserted {
                Ok(_) => return Ok(id),
                Err(err) if is_primary_key_collision(&err) => {}
                Err(err) => return Err(db_error(&err)),
            }
        }
        Err(SqliteStoreError::Db("could not allocate a unique stream id".to_string()))
    }

    /// Reads and verifies one row.
    fn fetch_session(&self, id: &StreamId) -> Result<Option<StoredSession>, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let metadata = tx
            .query_row(
                "SELECT length(state_blob), state_hash, hash_algorithm, dataset_id, owner_id FROM \
                 streams WHERE stream_id = ?1",
                params![id.to_string()],
                |row| {
                    let length: i64 = row.get(0)?;
                    let hash: String = row.get(1)?;
                    let algorithm: String = row.get(2)?;
                    let dataset_id: String = row.get(3)?;
                    let owner_id: Option<String> = row.get(4)?;
                    Ok((length, hash, algorithm, dataset_id, owner_id))
                },
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let Some((length, hash, algorithm, dataset_id, owner_id)) = metadata else {
            return Ok(None);
        };
        let length = usize::try_from(length).map_err(|_| {
            SqliteStoreError::Invalid(format!("negative state length for stream {id}"))
        })?;
        ensure_within_limit(length)?;
        let bytes: Vec<u8> = tx
            .query_row(
                "SELECT state_blob FROM streams WHERE stream_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);

        let algorithm = parse_hash_algorithm(&algorithm)?;
        if hash_bytes(algorithm, &bytes).value != hash {
            return Err(SqliteStoreError::Corrupt(format!("hash mismatch for stream {id}")));
        }
        let owner_id = owner_id
            .map(UserId::new)
            .transpose()
            .map_err(|err| SqliteStoreError::Corrupt(format!("owner of stream {id}: {err}")))?;
        Ok(Some(StoredSession {
            blob: StateBlob::from_bytes(bytes),
            dataset_id,
            owner_id,
        }))
    }

    /// Replaces one row's blob. Returns false when the row does not exist.
    fn update_session(&self, id: &StreamId, blob: &StateBlob) -> Result<bool, SqliteStoreError> {
        ensure_within_limit(blob.len())?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, blob.as_bytes());
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let updated = tx
            .execute(
                "UPDATE streams SET state_blob = ?2, state_hash = ?3, hash_algorithm = ?4, \
                 updated_at = ?5 WHERE stream_id = ?1",
                params![
                    id.to_string(),
                    blob.as_bytes(),
                    digest.value,
                    digest.algorithm.label(),
                    unix_millis()
                ],
            )
            .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(updated > 0)
    }

    /// Runs a stream-id listing query bound to one user.
    fn query_stream_ids(&self, sql: &str, user: &UserId) -> Result<Vec<StreamId>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut statement = guard.prepare(sql).map_err(|err| db_error(&err))?;
        let rows = statement
            .query_map(params![user.as_str()], |row| row.get::<_, String>(0))
            .map_err(|err| db_error(&err))?;
        let mut ids = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| db_error(&err))?;
            let id = StreamId::parse(&raw).map_err(|_| {
                SqliteStoreError::Corrupt(format!("invalid stored stream id: {raw}"))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Records an ownership pair. Returns false when the stream does not exist.
    fn insert_owner(&self, owner: &UserId, id: &StreamId) -> Result<bool, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        if !stream_exists(&tx, id)? {
            return Ok(false);
        }
        tx.execute(
            "INSERT OR IGNORE INTO stream_owners (user_id, stream_id, recorded_at) VALUES (?1, \
             ?2, ?3)",
            params![owner.as_str(), id.to_string(), unix_millis()],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(true)
    }

    /// Checks an ownership pair. Returns `None` when the stream does not exist.
    fn check_owner(&self, id: &StreamId, owner: &UserId) -> Result<Option<bool>, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        if !stream_exists(&tx, id)? {
            return Ok(None);
        }
        let owned: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM stream_owners WHERE user_id = ?1 AND stream_id = ?2",
                params![owner.as_str(), id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(Some(owned.is_some()))
    }

    /// Verifies the store can execute a simple SQL statement.
    fn check_connection(&self) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).map_err(|err| db_error(&err))?;
        Ok(())
    }
}

impl SessionStore for SqliteSessionStore {
    fn create(
        &self,
        blob: &StateBlob,
        owner_id: Option<&UserId>,
        dataset_id: &str,
    ) -> Result<StreamId, StoreError> {
        Ok(self.insert_session(blob, owner_id, dataset_id)?)
    }

    fn read(&self, id: &StreamId) -> Result<StoredSession, StoreError> {
        self.fetch_session(id)?.ok_or(StoreError::NotFound(*id))
    }

    fn overwrite(&self, id: &StreamId, blob: &StateBlob) -> Result<(), StoreError> {
        if self.update_session(id, blob)? { Ok(()) } else { Err(StoreError::NotFound(*id)) }
    }

    fn list_by_owner(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        Ok(self.query_stream_ids(
            "SELECT stream_id FROM streams WHERE owner_id = ?1 ORDER BY created_at, rowid",
            owner,
        )?)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        Ok(self.check_connection()?)
    }
}

impl OwnershipMap for SqliteSessionStore {
    fn record(&self, owner: &UserId, id: &StreamId) -> Result<(), StoreError> {
        if self.insert_owner(owner, id)? { Ok(()) } else { Err(StoreError::NotFound(*id)) }
    }

    fn list_sessions(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        Ok(self.query_stream_ids(
            "SELECT stream_id FROM stream_owners WHERE user_id = ?1 ORDER BY recorded_at, rowid",
            owner,
        )?)
    }

    fn is_owner(&self, id: &StreamId, owner: &UserId) -> Result<bool, StoreError> {
        self.check_owner(id, owner)?.ok_or(StoreError::NotFound(*id))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS streams (
                    stream_id TEXT PRIMARY KEY NOT NULL,
                    owner_id TEXT,
                    dataset_id TEXT NOT NULL,
                    state_blob BLOB NOT NULL,
                    state_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_streams_owner_id ON streams (owner_id);
                CREATE TABLE IF NOT EXISTS stream_owners (
                    user_id TEXT NOT NULL,
                    stream_id TEXT NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    PRIMARY KEY (user_id, stream_id),
                    FOREIGN KEY (stream_id) REFERENCES streams(stream_id) ON DELETE CASCADE
                );",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}

/// Returns whether a stream row exists.
fn stream_exists(tx: &rusqlite::Transaction<'_>, id: &StreamId) -> Result<bool, SqliteStoreError> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM streams WHERE stream_id = ?1", params![id.to_string()], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|err| db_error(&err))?;
    Ok(found.is_some())
}

/// Returns whether `err` is a `stream_id` primary-key collision.
fn is_primary_key_collision(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Rejects blobs over [`MAX_STATE_BYTES`].
const fn ensure_within_limit(length: usize) -> Result<(), SqliteStoreError> {
    if length > MAX_STATE_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_STATE_BYTES,
            actual_bytes: length,
        });
    }
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}

/// Parses a stored hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::from_label(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}
