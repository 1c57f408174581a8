// crates/evalstream-core/src/lib.rs
// ============================================================================
// Module: Evalstream Core Library
// Description: Public API surface for the evaluation stream core.
// Purpose: Expose identifiers, error taxonomy, lifecycle, stores, and registry.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Evalstream core owns the session persistence and lifecycle layer: it
//! validates identifiers, freezes sessions into versioned opaque blobs, stores
//! them behind backend-agnostic interfaces, and drives every mutation through a
//! load, mutate, commit cycle. The evaluator engine itself is reached only
//! through the [`SessionFactory`] and [`StreamSession`] traits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::OwnershipMap;
pub use interfaces::SessionStore;
pub use interfaces::StoreError;
pub use interfaces::StoredSession;
pub use runtime::InMemorySessionStore;
pub use runtime::SessionHandle;
pub use runtime::SessionRegistry;
pub use runtime::SharedOwnershipMap;
pub use runtime::SharedSessionStore;
