// crates/evalstream-core/src/core/error.rs
// ============================================================================
// Module: Evalstream Error Taxonomy
// Description: Caller-facing error kinds with status codes and messages.
// Purpose: Give every layer one vocabulary for failures surfaced to callers.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! [`StreamError`] is the single error type crossing the registry boundary.
//! Each variant maps to exactly one HTTP status via
//! [`StreamError::status_code`] and carries the human-readable message that
//! the API renders as `{"detail": message}`. Lower layers keep their own
//! error enums and convert at the boundary; nothing here retries or swallows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

use crate::core::identifiers::IdentifierError;
use crate::core::lifecycle::SerializationError;

// ============================================================================
// SECTION: Construction Phase
// ============================================================================

/// Stage of session construction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionPhase {
    /// Dataset lookup or load.
    Dataset,
    /// Window setting split.
    Setting,
    /// Metric selection.
    Metrics,
    /// Evaluator engine assembly.
    Engine,
}

impl ConstructionPhase {
    /// Returns the message prefix naming the phase.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Dataset => "Error loading dataset",
            Self::Setting => "Error setting up sliding window",
            Self::Metrics => "Error creating metrics",
            Self::Engine => "Error creating evaluator streamer",
        }
    }
}

impl fmt::Display for ConstructionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

// ============================================================================
// SECTION: Stream Error
// ============================================================================

/// Failures surfaced to callers of the session registry and API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Caller-supplied identifier is not parseable.
    #[error("{0}")]
    InvalidIdentifier(String),
    /// Well-formed stream identifier with no stored session.
    #[error("Evaluator stream with ID {0} not found")]
    NotFound(String),
    /// Well-formed algorithm identifier not registered in the stream.
    #[error("Algorithm with ID {0} not found")]
    AlgorithmNotFound(String),
    /// Dataset identifier unknown to the catalog.
    #[error("Invalid Dataset ID")]
    UnknownDataset(String),
    /// Durable store failure.
    #[error("Evaluator stream storage failed: {0}")]
    Persistence(String),
    /// Freeze or thaw of the session blob failed.
    #[error("Error serializing evaluator stream: {0}")]
    Serialization(String),
    /// Operation rejected by lifecycle ordering.
    #[error("{0}")]
    IllegalTransition(String),
    /// Session construction failed in the named phase.
    #[error("{phase}: {message}")]
    DomainConstruction {
        /// Failed phase.
        phase: ConstructionPhase,
        /// Underlying failure message.
        message: String,
    },
    /// No current user where one is required.
    #[error("Not authenticated")]
    Unauthenticated,
    /// Current user does not own the stream.
    #[error("User does not have access to stream {0}")]
    Forbidden(String),
    /// Semantically invalid request payload.
    #[error("{0}")]
    InvalidRequest(String),
    /// Request body could not be decoded.
    #[error("{0}")]
    UnprocessableRequest(String),
    /// Operation not supported for this session's configuration.
    #[error("{0}")]
    Unsupported(String),
    /// Any other evaluator engine failure.
    #[error("{0}")]
    Engine(String),
}

impl StreamError {
    /// Returns the HTTP status code for this error kind.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIdentifier(_) | Self::InvalidRequest(_) => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) | Self::AlgorithmNotFound(_) | Self::UnknownDataset(_) => 404,
            Self::IllegalTransition(_) => 409,
            Self::UnprocessableRequest(_) => 422,
            Self::Persistence(_)
            | Self::Serialization(_)
            | Self::DomainConstruction {
                ..
            }
            | Self::Engine(_) => 500,
            Self::Unsupported(_) => 501,
        }
    }

    /// Returns a stable machine label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::NotFound(_) => "not_found",
            Self::AlgorithmNotFound(_) => "algorithm_not_found",
            Self::UnknownDataset(_) => "unknown_dataset",
            Self::Persistence(_) => "persistence_error",
            Self::Serialization(_) => "serialization_error",
            Self::IllegalTransition(_) => "illegal_transition",
            Self::DomainConstruction {
                ..
            } => "domain_construction_error",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnprocessableRequest(_) => "unprocessable_request",
            Self::Unsupported(_) => "unsupported",
            Self::Engine(_) => "engine_error",
        }
    }

    /// Builds a construction error for the given phase.
    #[must_use]
    pub fn construction(phase: ConstructionPhase, message: impl Into<String>) -> Self {
        Self::DomainConstruction {
            phase,
            message: message.into(),
        }
    }
}

impl From<IdentifierError> for StreamError {
    fn from(error: IdentifierError) -> Self {
        Self::InvalidIdentifier(error.to_string())
    }
}

impl From<SerializationError> for StreamError {
    fn from(error: SerializationError) -> Self {
        Self::Serialization(error.to_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
