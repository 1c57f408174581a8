// crates/evalstream-core/src/interfaces/mod.rs
// ============================================================================
// Module: Evalstream Interfaces
// Description: Backend-agnostic session store and ownership map contracts.
// Purpose: Define the storage surfaces the session registry depends on.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Storage backends implement [`SessionStore`] and [`OwnershipMap`]. Blobs are
//! opaque at this layer: no backend may inspect or query their contents.
//! Backends must fail closed: a missing row is [`StoreError::NotFound`], never
//! an empty success, and every other failure is surfaced unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::error::StreamError;
use crate::core::identifiers::StreamId;
use crate::core::identifiers::UserId;
use crate::core::lifecycle::StateBlob;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Session store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Only [`StoreError::NotFound`] maps to a 404; every other variant is a
///   persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No row exists for the identifier.
    #[error("session {0} not found")]
    NotFound(StreamId),
    /// Store I/O error.
    #[error("session store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("session store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("session store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data or arguments are invalid.
    #[error("session store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("session store error: {0}")]
    Store(String),
}

impl From<StoreError> for StreamError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            other => Self::Persistence(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// A stored session row as returned by [`SessionStore::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    /// Frozen session state.
    pub blob: StateBlob,
    /// Dataset tag recorded at creation.
    pub dataset_id: String,
    /// Owner recorded at creation, if any.
    pub owner_id: Option<UserId>,
}

/// Durable keyed storage for frozen sessions.
pub trait SessionStore {
    /// Allocates a fresh identifier and inserts one row for it.
    ///
    /// Never overwrites an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create(
        &self,
        blob: &StateBlob,
        owner_id: Option<&UserId>,
        dataset_id: &str,
    ) -> Result<StreamId, StoreError>;

    /// Reads the row for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row exists, other
    /// [`StoreError`] variants on storage failure.
    fn read(&self, id: &StreamId) -> Result<StoredSession, StoreError>;

    /// Replaces the blob for `id` wholesale.
    ///
    /// On failure the stored row is left exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row exists, other
    /// [`StoreError`] variants on storage failure.
    fn overwrite(&self, id: &StreamId, blob: &StateBlob) -> Result<(), StoreError>;

    /// Lists identifiers whose `owner_id` column equals `owner`, in creation
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_by_owner(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError>;

    /// Reports store readiness for liveness and readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Ownership Map
// ============================================================================

/// Associates sessions with the users that own them.
pub trait OwnershipMap {
    /// Records `owner` as owning `id`. Called once, at creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `id` does not exist, other
    /// [`StoreError`] variants on storage failure.
    fn record(&self, owner: &UserId, id: &StreamId) -> Result<(), StoreError>;

    /// Lists sessions recorded for `owner`, in recording order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn list_sessions(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError>;

    /// Returns whether `owner` owns `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `id` does not exist; a missing
    /// session is never reported as `false`.
    fn is_owner(&self, id: &StreamId, owner: &UserId) -> Result<bool, StoreError>;
}
