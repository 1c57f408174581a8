// crates/evalstream-server/src/identity.rs
// ============================================================================
// Module: Identity and Access
// Description: Current-user resolution and ownership enforcement.
// Purpose: Provide fail-closed identity and access decisions for API calls.
// Dependencies: axum, evalstream-config, evalstream-core
// ============================================================================

//! ## Overview
//! An [`IdentityProvider`] turns request headers into an optional current
//! user. [`AccessPolicy`] decides whether that user may create a stream or act
//! on an existing one. Malformed identity input is rejected, never treated as
//! anonymous.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::HeaderName;
use evalstream_config::IdentityConfig;
use evalstream_config::IdentityMode;
use evalstream_config::OwnershipConfig;
use evalstream_core::StreamError;
use evalstream_core::StreamId;
use evalstream_core::UserId;

// ============================================================================
// SECTION: Constants
// ============================================================================

const MAX_IDENTITY_HEADER_BYTES: usize = 1024;

// ============================================================================
// SECTION: Identity Providers
// ============================================================================

/// Resolves the current user of a request.
pub trait IdentityProvider: Send + Sync {
    /// Returns the current user, or `None` when the request is anonymous.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unauthenticated`] when identity input is present
    /// but unusable.
    fn current_user(&self, headers: &HeaderMap) -> Result<Option<UserId>, StreamError>;
}

/// Every request is anonymous.
pub struct AnonymousIdentity;

impl IdentityProvider for AnonymousIdentity {
    fn current_user(&self, _headers: &HeaderMap) -> Result<Option<UserId>, StreamError> {
        Ok(None)
    }
}

/// Reads the user id from a request header set by a trusted front proxy.
pub struct HeaderIdentity {
    /// Header carrying the user id.
    header: HeaderName,
}

impl HeaderIdentity {
    /// Creates a provider reading `header`.
    #[must_use]
    pub const fn new(header: HeaderName) -> Self {
        Self {
            header,
        }
    }
}

impl IdentityProvider for HeaderIdentity {
    fn current_user(&self, headers: &HeaderMap) -> Result<Option<UserId>, StreamError> {
        let Some(value) = headers.get(&self.header) else {
            return Ok(None);
        };
        if value.len() > MAX_IDENTITY_HEADER_BYTES {
            return Err(StreamError::Unauthenticated);
        }
        let raw = value.to_str().map_err(|_| StreamError::Unauthenticated)?;
        let user = UserId::new(raw.trim()).map_err(|_| StreamError::Unauthenticated)?;
        Ok(Some(user))
    }
}

/// Every request runs as one configured user.
pub struct StaticIdentity {
    /// Configured user.
    user: UserId,
}

impl StaticIdentity {
    /// Creates a provider always returning `user`.
    #[must_use]
    pub const fn new(user: UserId) -> Self {
        Self {
            user,
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self, _headers: &HeaderMap) -> Result<Option<UserId>, StreamError> {
        Ok(Some(self.user.clone()))
    }
}

/// Builds the identity provider named by configuration.
///
/// # Errors
///
/// Returns a message when the header name or static user id is unusable.
pub fn identity_from_config(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityProvider>, String> {
    match config.mode {
        IdentityMode::Anonymous => Ok(Arc::new(AnonymousIdentity)),
        IdentityMode::Header => {
            let header = HeaderName::from_bytes(config.header.trim().to_ascii_lowercase().as_bytes())
                .map_err(|err| format!("invalid identity header: {err}"))?;
            Ok(Arc::new(HeaderIdentity::new(header)))
        }
        IdentityMode::Static => {
            let raw = config
                .user_id
                .as_deref()
                .ok_or_else(|| "static identity requires user_id".to_string())?;
            let user = UserId::new(raw).map_err(|err| err.to_string())?;
            Ok(Arc::new(StaticIdentity::new(user)))
        }
    }
}

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Ownership rules applied before registry calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
    /// Stream creation needs a current user.
    pub require_owner: bool,
    /// Stream-scoped operations need the current user to own the stream.
    pub enforce_access: bool,
}

impl From<OwnershipConfig> for AccessPolicy {
    fn from(config: OwnershipConfig) -> Self {
        Self {
            require_owner: config.require_owner,
            enforce_access: config.enforce_access,
        }
    }
}

impl AccessPolicy {
    /// Returns the owner to record for a new stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unauthenticated`] when an owner is required and
    /// the request is anonymous.
    pub fn creation_owner<'a>(
        &self,
        caller: Option<&'a UserId>,
    ) -> Result<Option<&'a UserId>, StreamError> {
        if self.require_owner && caller.is_none() {
            return Err(StreamError::Unauthenticated);
        }
        Ok(caller)
    }

    /// Checks that `caller` may act on `stream_id`.
    ///
    /// `is_owner` is only consulted when access enforcement is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Unauthenticated`], [`StreamError::Forbidden`], or
    /// the ownership lookup's own error.
    pub fn authorize_stream(
        &self,
        stream_id: &StreamId,
        caller: Option<&UserId>,
        is_owner: impl FnOnce(&StreamId, &UserId) -> Result<bool, StreamError>,
    ) -> Result<(), StreamError> {
        if !self.enforce_access {
            return Ok(());
        }
        let user = require_user(caller)?;
        if is_owner(stream_id, user)? {
            Ok(())
        } else {
            Err(StreamError::Forbidden(stream_id.to_string()))
        }
    }
}

/// Returns the current user or fails unauthenticated.
///
/// # Errors
///
/// Returns [`StreamError::Unauthenticated`] for anonymous requests.
pub fn require_user(caller: Option<&UserId>) -> Result<&UserId, StreamError> {
    caller.ok_or(StreamError::Unauthenticated)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
