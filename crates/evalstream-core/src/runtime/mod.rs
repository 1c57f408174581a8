// crates/evalstream-core/src/runtime/mod.rs
// ============================================================================
// Module: Evalstream Runtime
// Description: Session registry and in-memory store backends.
// Purpose: Execute load, mutate, commit cycles against a session store.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules hold the registry that every API operation goes through and
//! the in-memory store used by tests and the `memory` backend.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod registry;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use registry::SessionHandle;
pub use registry::SessionRegistry;
pub use store::InMemorySessionStore;
pub use store::SharedOwnershipMap;
pub use store::SharedSessionStore;
