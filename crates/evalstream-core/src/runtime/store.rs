// crates/evalstream-core/src/runtime/store.rs
// ============================================================================
// Module: Evalstream In-Memory Store
// Description: In-memory session store and ownership map, plus shared wrappers.
// Purpose: Provide a store backend that needs no database for tests and demos.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemorySessionStore`] implements both [`SessionStore`] and
//! [`OwnershipMap`] over mutex-guarded maps. It honours the same contract as
//! the durable backend (fresh ids, `NotFound` on missing rows, whole-blob
//! overwrite) but loses everything when the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::identifiers::StreamId;
use crate::core::identifiers::UserId;
use crate::core::lifecycle::StateBlob;
use crate::interfaces::OwnershipMap;
use crate::interfaces::SessionStore;
use crate::interfaces::StoreError;
use crate::interfaces::StoredSession;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// One stored row plus its creation sequence number.
#[derive(Debug, Clone)]
struct Row {
    /// Monotonic creation order.
    seq: u64,
    /// Stored session.
    session: StoredSession,
}

/// Mutable state guarded by one mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Next creation sequence number.
    next_seq: u64,
    /// Rows keyed by stream identifier.
    rows: BTreeMap<StreamId, Row>,
    /// Ownership pairs in recording order.
    owners: Vec<(UserId, StreamId)>,
}

/// In-memory session store and ownership map.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    /// Shared state protected by a mutex.
    inner: Arc<Mutex<Inner>>,
}

impl InMemorySessionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Store("session store mutex poisoned".to_string()))
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(
        &self,
        blob: &StateBlob,
        owner_id: Option<&UserId>,
        dataset_id: &str,
    ) -> Result<StreamId, StoreError> {
        let mut guard = self.lock()?;
        let mut id = StreamId::new_v4();
        while guard.rows.contains_key(&id) {
            id = StreamId::new_v4();
        }
        let seq = guard.next_seq;
        guard.next_seq = seq.saturating_add(1);
        guard.rows.insert(
            id,
            Row {
                seq,
                session: StoredSession {
                    blob: blob.clone(),
                    dataset_id: dataset_id.to_string(),
                    owner_id: owner_id.cloned(),
                },
            },
        );
        drop(guard);
        Ok(id)
    }

    fn read(&self, id: &StreamId) -> Result<StoredSession, StoreError> {
        let guard = self.lock()?;
        guard.rows.get(id).map(|row| row.session.clone()).ok_or(StoreError::NotFound(*id))
    }

    fn overwrite(&self, id: &StreamId, blob: &StateBlob) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let row = guard.rows.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        row.session.blob = blob.clone();
        drop(guard);
        Ok(())
    }

    fn list_by_owner(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        let guard = self.lock()?;
        let mut rows: Vec<(u64, StreamId)> = guard
            .rows
            .iter()
            .filter(|(_, row)| row.session.owner_id.as_ref() == Some(owner))
            .map(|(id, row)| (row.seq, *id))
            .collect();
        drop(guard);
        rows.sort_unstable_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, id)| id).collect())
    }
}

impl OwnershipMap for InMemorySessionStore {
    fn record(&self, owner: &UserId, id: &StreamId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if !guard.rows.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        let pair = (owner.clone(), *id);
        if !guard.owners.contains(&pair) {
            guard.owners.push(pair);
        }
        drop(guard);
        Ok(())
    }

    fn list_sessions(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.owners.iter().filter(|(user, _)| user == owner).map(|(_, id)| *id).collect())
    }

    fn is_owner(&self, id: &StreamId, owner: &UserId) -> Result<bool, StoreError> {
        let guard = self.lock()?;
        if !guard.rows.contains_key(id) {
            return Err(StoreError::NotFound(*id));
        }
        Ok(guard.owners.iter().any(|(user, stream)| user == owner && stream == id))
    }
}

// ============================================================================
// SECTION: Shared Wrappers
// ============================================================================

/// Shared session store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedSessionStore {
    /// Inner store implementation.
    inner: Arc<dyn SessionStore + Send + Sync>,
}

impl SharedSessionStore {
    /// Wraps a session store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl SessionStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn SessionStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl SessionStore for SharedSessionStore {
    fn create(
        &self,
        blob: &StateBlob,
        owner_id: Option<&UserId>,
        dataset_id: &str,
    ) -> Result<StreamId, StoreError> {
        self.inner.create(blob, owner_id, dataset_id)
    }

    fn read(&self, id: &StreamId) -> Result<StoredSession, StoreError> {
        self.inner.read(id)
    }

    fn overwrite(&self, id: &StreamId, blob: &StateBlob) -> Result<(), StoreError> {
        self.inner.overwrite(id, blob)
    }

    fn list_by_owner(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        self.inner.list_by_owner(owner)
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness()
    }
}

/// Shared ownership map backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedOwnershipMap {
    /// Inner map implementation.
    inner: Arc<dyn OwnershipMap + Send + Sync>,
}

impl SharedOwnershipMap {
    /// Wraps an ownership map in a shared, clonable wrapper.
    #[must_use]
    pub fn from_map(map: impl OwnershipMap + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(map),
        }
    }

    /// Wraps an existing shared map.
    #[must_use]
    pub const fn new(map: Arc<dyn OwnershipMap + Send + Sync>) -> Self {
        Self {
            inner: map,
        }
    }
}

impl OwnershipMap for SharedOwnershipMap {
    fn record(&self, owner: &UserId, id: &StreamId) -> Result<(), StoreError> {
        self.inner.record(owner, id)
    }

    fn list_sessions(&self, owner: &UserId) -> Result<Vec<StreamId>, StoreError> {
        self.inner.list_sessions(owner)
    }

    fn is_owner(&self, id: &StreamId, owner: &UserId) -> Result<bool, StoreError> {
        self.inner.is_owner(id, owner)
    }
}
