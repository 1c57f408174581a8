// crates/evalstream-server/src/lib.rs
// ============================================================================
// Module: Evalstream Server
// Description: HTTP/JSON API for evaluation stream sessions.
// Purpose: Expose the session registry over HTTP with identity and auditing.
// Dependencies: evalstream-core, evalstream-engine, evalstream-config, axum, tokio
// ============================================================================

//! ## Overview
//! Evalstream server exposes the session registry as a JSON API. Handlers are
//! thin: [`api::StreamApi`] owns identifier validation, access checks, and the
//! load/mutate/commit cycle, while [`server::StreamServer`] owns transport,
//! status mapping, and audit logging.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod audit;
pub mod identity;
pub mod models;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::StreamApi;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::StreamAuditEvent;
pub use audit::StreamAuditSink;
pub use audit::StreamOperation;
pub use identity::AccessPolicy;
pub use identity::IdentityProvider;
pub use server::StreamServer;
pub use server::StreamServerError;
