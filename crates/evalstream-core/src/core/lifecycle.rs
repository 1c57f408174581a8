// crates/evalstream-core/src/core/lifecycle.rs
// ============================================================================
// Module: Evalstream Serialization Lifecycle
// Description: Versioned state blobs and the freeze/thaw session contract.
// Purpose: Turn in-memory sessions into opaque, self-describing blobs and back.
// Dependencies: serde, serde_json, thiserror, crate::core::hashing
// ============================================================================

//! ## Overview
//! A [`StateBlob`] is opaque to every storage backend. Internally it is a JSON
//! envelope:
//!
//! ```text
//! {"digest": {...}, "format": "evalstream.session", "payload": "<jcs json>", "version": 1}
//! ```
//!
//! `payload` holds the RFC 8785 canonical JSON of the session as a string and
//! `digest` is the SHA-256 of exactly those bytes. Opening a blob checks the
//! format tag, the schema version, and the digest before decoding, so a blob
//! written by another schema version fails with
//! [`SerializationError::VersionMismatch`] instead of being misread.
//!
//! Session types implement [`SessionLifecycle`]: `freeze` drops transient
//! state and seals the rest, `thaw` opens the blob and rebuilds what `freeze`
//! dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::error::StreamError;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::hash_bytes;
use crate::core::status::AlgorithmState;
use crate::core::status::StreamStatus;
use crate::core::status::derive_status;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Format tag written into every session envelope.
pub const STATE_BLOB_FORMAT: &str = "evalstream.session";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Freeze or thaw failures. The data is at fault, not the storage medium.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    /// Session could not be encoded.
    #[error("encode failed: {0}")]
    Encode(String),
    /// Blob or payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
    /// Payload digest does not match its content.
    #[error("blob digest mismatch")]
    Corrupt,
    /// Blob was written with a different format or schema version.
    #[error("blob version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Format and version this reader accepts.
        expected: String,
        /// Format and version found in the blob.
        found: String,
    },
    /// Transient state could not be rebuilt after decoding.
    #[error("thaw failed: {0}")]
    Thaw(String),
}

// ============================================================================
// SECTION: State Blob
// ============================================================================

/// On-blob envelope wrapping the canonical session payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    /// Format tag; always [`STATE_BLOB_FORMAT`].
    format: String,
    /// Schema version of the payload.
    version: u32,
    /// Digest over the payload bytes.
    digest: HashDigest,
    /// Canonical JSON payload.
    payload: String,
}

/// Opaque serialized snapshot of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBlob(Vec<u8>);

impl StateBlob {
    /// Wraps raw bytes read from storage.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the blob and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the blob size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a zero-length blob.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Seals a serializable session into a versioned blob.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Encode`] when the value cannot be
    /// canonicalized.
    pub fn seal<T: Serialize>(version: u32, value: &T) -> Result<Self, SerializationError> {
        let payload_bytes = canonical_json_bytes(value)
            .map_err(|err| SerializationError::Encode(err.to_string()))?;
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &payload_bytes);
        let payload = String::from_utf8(payload_bytes)
            .map_err(|err| SerializationError::Encode(err.to_string()))?;
        let envelope = Envelope {
            format: STATE_BLOB_FORMAT.to_string(),
            version,
            digest,
            payload,
        };
        canonical_json_bytes(&envelope)
            .map(Self)
            .map_err(|err| SerializationError::Encode(err.to_string()))
    }

    /// Opens a blob written with `expected_version` and decodes its payload.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] when the envelope is malformed, tagged
    /// with another format or version, fails its digest check, or does not
    /// decode as `T`.
    pub fn open<T: DeserializeOwned>(&self, expected_version: u32) -> Result<T, SerializationError> {
        let envelope: Envelope = serde_json::from_slice(&self.0)
            .map_err(|err| SerializationError::Decode(err.to_string()))?;
        if envelope.format != STATE_BLOB_FORMAT || envelope.version != expected_version {
            return Err(SerializationError::VersionMismatch {
                expected: format!("{STATE_BLOB_FORMAT}/v{expected_version}"),
                found: format!("{}/v{}", envelope.format, envelope.version),
            });
        }
        let actual = hash_bytes(envelope.digest.algorithm, envelope.payload.as_bytes());
        if actual != envelope.digest {
            return Err(SerializationError::Corrupt);
        }
        serde_json::from_str(&envelope.payload)
            .map_err(|err| SerializationError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Session Contracts
// ============================================================================

/// Freeze/thaw hooks every persisted session implements.
pub trait SessionLifecycle: Sized {
    /// Renders the whole session into a durable blob, dropping transient state.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] when the session cannot be encoded.
    fn freeze(&self) -> Result<StateBlob, SerializationError>;

    /// Rebuilds a working session from a blob, including transient state.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] when the blob cannot be decoded or the
    /// transient state cannot be rebuilt.
    fn thaw(blob: &StateBlob) -> Result<Self, SerializationError>;
}

/// The view of a session the registry needs beyond freeze/thaw.
pub trait StreamSession: SessionLifecycle {
    /// Dataset tag stored in a queryable column next to the blob.
    fn dataset_id(&self) -> &str;

    /// Returns true once the run has been started.
    fn has_started(&self) -> bool;

    /// Returns the state of every registered algorithm participant.
    fn algorithm_states(&self) -> Vec<AlgorithmState>;

    /// Derives lifecycle status from the nested participant states.
    fn status(&self) -> StreamStatus {
        derive_status(self.has_started(), self.algorithm_states())
    }
}

/// Builds fresh sessions from caller configuration.
pub trait SessionFactory {
    /// Configuration accepted by [`SessionFactory::build`].
    type Config;
    /// Session type produced.
    type Session: StreamSession;

    /// Builds an initial, not yet started session.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] raised by the construction step, typically
    /// [`StreamError::UnknownDataset`] or
    /// [`StreamError::DomainConstruction`].
    fn build(&self, config: &Self::Config) -> Result<Self::Session, StreamError>;
}

// ============================================================================
// SECTION: Tests
// ============================================================================
