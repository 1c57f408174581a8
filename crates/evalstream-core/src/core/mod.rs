// crates/evalstream-core/src/core/mod.rs
// ============================================================================
// Module: Evalstream Core Types
// Description: Identifiers, errors, state machines, hashing, and lifecycle.
// Purpose: Group the pure data model shared by every other crate.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Pure types with no storage or transport concerns.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod lifecycle;
pub mod status;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ConstructionPhase;
pub use error::StreamError;
pub use identifiers::AlgorithmId;
pub use identifiers::AlgorithmKey;
pub use identifiers::IdentifierError;
pub use identifiers::StreamId;
pub use identifiers::UserId;
pub use lifecycle::SerializationError;
pub use lifecycle::SessionFactory;
pub use lifecycle::SessionLifecycle;
pub use lifecycle::StateBlob;
pub use lifecycle::StreamSession;
pub use status::AlgorithmState;
pub use status::IllegalTransition;
pub use status::StreamStatus;
pub use status::derive_status;
