// crates/evalstream-store-sqlite/src/lib.rs
// ============================================================================
// Module: Evalstream SQLite Store Library
// Description: SQLite-backed session store and ownership map.
// Purpose: Persist frozen evaluation sessions across restarts.
// Dependencies: evalstream-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! `evalstream-store-sqlite` provides [`SqliteSessionStore`], a durable
//! implementation of the core [`SessionStore`](evalstream_core::SessionStore)
//! and [`OwnershipMap`](evalstream_core::OwnershipMap) contracts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_STATE_BYTES;
pub use store::SqliteSessionStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
