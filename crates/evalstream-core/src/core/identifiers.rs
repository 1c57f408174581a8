// crates/evalstream-core/src/core/identifiers.rs
// ============================================================================
// Module: Evalstream Identifiers
// Description: Canonical identifiers for streams, algorithms, and owners.
// Purpose: Parse externally supplied identifiers once at the boundary.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! Stream and algorithm identifiers are UUIDs. Parsing accepts every textual
//! form the UUID grammar allows (hyphenated, simple, braced, URN) and
//! [`std::fmt::Display`] always renders the lowercase hyphenated form, so
//! `parse(parse(x).to_string()) == parse(x)` holds for every accepted input.
//!
//! Owner identifiers are opaque strings produced by the identity provider.
//! They are bounded and free of control characters but otherwise unchecked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted length for a user identifier in bytes.
pub const MAX_USER_ID_BYTES: usize = 256;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parse failures, one per identifier context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Malformed stream identifier.
    #[error("Invalid Stream UUID format")]
    Stream,
    /// Malformed algorithm identifier.
    #[error("Invalid Algorithm UUID format")]
    Algorithm,
    /// Malformed user identifier.
    #[error("Invalid user identifier: {0}")]
    User(String),
}

// ============================================================================
// SECTION: Stream Identifier
// ============================================================================

/// Identifier of one evaluation stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Allocates a fresh random stream identifier.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a caller-supplied stream identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Stream`] when `raw` is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(raw).map(Self).map_err(|_| IdentifierError::Stream)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

// ============================================================================
// SECTION: Algorithm Identifier
// ============================================================================

/// Identifier of an algorithm participant, unique within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlgorithmId(Uuid);

impl AlgorithmId {
    /// Allocates a fresh random algorithm identifier.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a caller-supplied algorithm identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Algorithm`] when `raw` is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(raw).map(Self).map_err(|_| IdentifierError::Algorithm)
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Structured key naming one algorithm participant in listings and metrics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlgorithmKey {
    /// Caller-supplied label.
    pub name: String,
    /// Participant identifier.
    pub id: AlgorithmId,
}

// ============================================================================
// SECTION: User Identifier
// ============================================================================

/// Opaque identifier of an owning user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a user identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::User`] when the value is empty, too long, or
    /// contains control characters.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdentifierError::User("must not be empty".to_string()));
        }
        if raw.len() > MAX_USER_ID_BYTES {
            return Err(IdentifierError::User(format!(
                "exceeds {MAX_USER_ID_BYTES} bytes"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(IdentifierError::User("contains control characters".to_string()));
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn stream_id_accepts_alternate_uuid_forms() {
        let hyphenated = StreamId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let simple = StreamId::parse("67e5504410b1426f9247bb680e5fe0c8").unwrap();
        let braced = StreamId::parse("{67e55044-10b1-426f-9247-bb680e5fe0c8}").unwrap();
        let urn = StreamId::parse("urn:uuid:67E55044-10B1-426F-9247-BB680E5FE0C8").unwrap();
        assert_eq!(hyphenated, simple);
        assert_eq!(hyphenated, braced);
        assert_eq!(hyphenated, urn);
        assert_eq!(urn.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn parse_errors_carry_context_messages() {
        assert_eq!(
            StreamId::parse("not-a-uuid").unwrap_err().to_string(),
            "Invalid Stream UUID format"
        );
        assert_eq!(
            AlgorithmId::parse("").unwrap_err().to_string(),
            "Invalid Algorithm UUID format"
        );
    }

    #[test]
    fn user_id_rejects_empty_and_control_characters() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("alice\n").is_err());
        assert!(UserId::new("a".repeat(MAX_USER_ID_BYTES + 1)).is_err());
        assert_eq!(UserId::new("alice").unwrap().as_str(), "alice");
    }
}
