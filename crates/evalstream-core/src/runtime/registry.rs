// crates/evalstream-core/src/runtime/registry.rs
// ============================================================================
// Module: Evalstream Session Registry
// Description: Load, mutate, commit orchestration over the session store.
// Purpose: Be the only path by which sessions are created, read, and written.
// Dependencies: crate::core, crate::interfaces, crate::runtime::store
// ============================================================================

//! ## Overview
//! The registry wraps a [`SessionStore`] with the serialization lifecycle.
//! Every read thaws, every write freezes, unconditionally.
//!
//! [`SessionRegistry::load`] hands out a [`SessionHandle`] that remembers the
//! identifier it came from, and [`SessionRegistry::commit`] consumes that
//! handle. A commit therefore always follows a load of the same identifier,
//! and a handle can be committed at most once.
//!
//! Writes are last-writer-wins: two concurrent load/commit cycles on the same
//! stream race and the later commit replaces the earlier one. No version
//! token is checked on overwrite.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::error::StreamError;
use crate::core::identifiers::StreamId;
use crate::core::identifiers::UserId;
use crate::core::lifecycle::SessionFactory;
use crate::core::lifecycle::SessionLifecycle;
use crate::core::lifecycle::StreamSession;
use crate::core::status::StreamStatus;
use crate::interfaces::OwnershipMap;
use crate::interfaces::SessionStore;
use crate::runtime::store::SharedOwnershipMap;
use crate::runtime::store::SharedSessionStore;

// ============================================================================
// SECTION: Session Handle
// ============================================================================

/// A thawed session bound to the identifier it was loaded from.
#[derive(Debug)]
pub struct SessionHandle<S> {
    /// Identifier the session was loaded from.
    id: StreamId,
    /// Dataset tag from the stored row.
    dataset_id: String,
    /// Owner from the stored row.
    owner_id: Option<UserId>,
    /// Working session.
    session: S,
}

impl<S> SessionHandle<S> {
    /// Returns the identifier this handle was loaded from.
    #[must_use]
    pub const fn id(&self) -> &StreamId {
        &self.id
    }

    /// Returns the dataset tag from the stored row.
    #[must_use]
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Returns the owner recorded at creation.
    #[must_use]
    pub const fn owner_id(&self) -> Option<&UserId> {
        self.owner_id.as_ref()
    }

    /// Returns the working session.
    #[must_use]
    pub const fn session(&self) -> &S {
        &self.session
    }

    /// Returns the working session for mutation.
    pub const fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Orchestrates session creation, loads, and commits.
#[derive(Clone)]
pub struct SessionRegistry<F> {
    /// Builds fresh sessions.
    factory: F,
    /// Durable session rows.
    store: SharedSessionStore,
    /// Owner to session associations.
    ownership: SharedOwnershipMap,
}

impl<F: SessionFactory> SessionRegistry<F> {
    /// Creates a registry over the given factory, store, and ownership map.
    #[must_use]
    pub const fn new(factory: F, store: SharedSessionStore, ownership: SharedOwnershipMap) -> Self {
        Self {
            factory,
            store,
            ownership,
        }
    }

    /// Returns the session factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Builds, freezes, and stores a new session, then records its owner.
    ///
    /// # Errors
    ///
    /// Returns the factory's construction error unchanged, or
    /// [`StreamError::Serialization`] / [`StreamError::Persistence`].
    pub fn create(
        &self,
        config: &F::Config,
        owner: Option<&UserId>,
    ) -> Result<StreamId, StreamError> {
        let session = self.factory.build(config)?;
        let blob = session.freeze()?;
        let id = self.store.create(&blob, owner, session.dataset_id())?;
        if let Some(owner) = owner {
            self.ownership.record(owner, &id).map_err(|err| {
                StreamError::Persistence(format!("owner not recorded for stream {id}: {err}"))
            })?;
        }
        Ok(id)
    }

    /// Reads and thaws the session stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotFound`], [`StreamError::Persistence`], or
    /// [`StreamError::Serialization`].
    pub fn load(&self, id: &StreamId) -> Result<SessionHandle<F::Session>, StreamError> {
        let stored = self.store.read(id)?;
        let session = F::Session::thaw(&stored.blob)?;
        Ok(SessionHandle {
            id: *id,
            dataset_id: stored.dataset_id,
            owner_id: stored.owner_id,
            session,
        })
    }

    /// Freezes the handle's session and overwrites its stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Serialization`] when freezing fails (nothing is
    /// written), [`StreamError::NotFound`] or [`StreamError::Persistence`]
    /// when the overwrite fails (the stored row is unchanged).
    pub fn commit(&self, handle: SessionHandle<F::Session>) -> Result<(), StreamError> {
        let blob = handle.session.freeze()?;
        self.store.overwrite(&handle.id, &blob)?;
        Ok(())
    }

    /// Loads `id`, applies one mutation, and commits only if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns load and commit errors, or the mutation's own error, in which
    /// case nothing is written.
    pub fn update<T>(
        &self,
        id: &StreamId,
        mutation: impl FnOnce(&mut F::Session) -> Result<T, StreamError>,
    ) -> Result<T, StreamError> {
        let mut handle = self.load(id)?;
        let output = mutation(handle.session_mut())?;
        self.commit(handle)?;
        Ok(output)
    }

    /// Loads `id` and runs a read-only query against it. Nothing is written.
    ///
    /// # Errors
    ///
    /// Returns load errors or the query's own error.
    pub fn inspect<T>(
        &self,
        id: &StreamId,
        query: impl FnOnce(&SessionHandle<F::Session>) -> Result<T, StreamError>,
    ) -> Result<T, StreamError> {
        let handle = self.load(id)?;
        query(&handle)
    }

    /// Derives the current status of `id`.
    ///
    /// # Errors
    ///
    /// Returns load errors.
    pub fn status(&self, id: &StreamId) -> Result<StreamStatus, StreamError> {
        self.inspect(id, |handle| Ok(handle.session().status()))
    }

    /// Lists every session owned by `owner` with its derived status.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the ownership lookup fails, or
    /// any load error for a listed session.
    pub fn list_owned(&self, owner: &UserId) -> Result<Vec<(StreamId, StreamStatus)>, StreamError> {
        let ids = self.ownership.list_sessions(owner)?;
        ids.into_iter().map(|id| Ok((id, self.status(&id)?))).collect()
    }

    /// Returns whether `owner` owns `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotFound`] for an unknown stream.
    pub fn is_owner(&self, id: &StreamId, owner: &UserId) -> Result<bool, StreamError> {
        Ok(self.ownership.is_owner(id, owner)?)
    }

    /// Reports whether the backing store is ready to serve requests.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the store is unavailable.
    pub fn readiness(&self) -> Result<(), StreamError> {
        Ok(self.store.readiness()?)
    }
}
