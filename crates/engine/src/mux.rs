// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-slot, LRU-suspending multiplexer over live provider sessions.
//!
//! At most `max_slots` provider sessions are ever held in memory at once.
//! Releasing a session makes it eligible for eviction; acquiring a slotted
//! session promotes it out of the eviction queue. Eviction suspends the
//! victim through its provider, persists the resulting state blob via the
//! session store, and drops the in-memory handle.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use substrat_core::{Session, SessionId};
use substrat_providers::ProviderSession;
use substrat_storage::SessionStore;

use crate::error::MuxError;

/// Invoked after a session has been suspended and evicted, with the id and
/// the size in bytes of the persisted provider-state blob.
pub type OnEvict = Arc<dyn Fn(SessionId, usize) + Send + Sync>;

/// Owns the slot table and LRU queue. Does not own the agent tree, the
/// event-log registry, or the deferred-work queue — those belong to the
/// scheduler that drives this mux.
pub struct SessionMux {
    store: Arc<SessionStore>,
    max_slots: usize,
    slots: HashMap<SessionId, Box<dyn ProviderSession>>,
    /// Head (front) is the next eviction victim.
    lru: VecDeque<SessionId>,
    held: HashSet<SessionId>,
    on_evict: Option<OnEvict>,
}

impl SessionMux {
    pub fn new(store: Arc<SessionStore>, max_slots: usize) -> Self {
        Self {
            store,
            max_slots,
            slots: HashMap::new(),
            lru: VecDeque::new(),
            held: HashSet::new(),
            on_evict: None,
        }
    }

    pub fn with_on_evict(mut self, cb: OnEvict) -> Self {
        self.on_evict = Some(cb);
        self
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut Box<dyn ProviderSession>> {
        self.slots.get_mut(&id)
    }

    /// Promote an already-slotted session out of the LRU queue and mark it
    /// held. Returns `false` if the session is not currently slotted.
    pub fn promote(&mut self, id: SessionId) -> bool {
        if !self.slots.contains_key(&id) {
            return false;
        }
        self.lru.retain(|x| *x != id);
        self.held.insert(id);
        true
    }

    /// Slot a freshly created or restored provider session, evicting the
    /// LRU head first if the mux is at capacity.
    pub async fn put(&mut self, id: SessionId, ps: Box<dyn ProviderSession>) -> Result<(), MuxError> {
        if !self.slots.contains_key(&id) {
            self.ensure_slot().await?;
        }
        self.lru.retain(|x| *x != id);
        self.held.insert(id);
        self.slots.insert(id, ps);
        Ok(())
    }

    /// Release a held session back to the LRU queue. No-op if the session
    /// is not currently slotted (it may have just been removed).
    pub fn release(&mut self, id: SessionId) {
        self.held.remove(&id);
        if self.slots.contains_key(&id) && !self.lru.contains(&id) {
            self.lru.push_back(id);
        }
    }

    /// Drop a session from the slot table entirely, stopping its provider
    /// session. No-op if the session is not slotted.
    pub async fn remove(&mut self, id: SessionId) {
        self.held.remove(&id);
        self.lru.retain(|x| *x != id);
        if let Some(mut ps) = self.slots.remove(&id) {
            // Idempotent by contract; a failure here does not block the
            // slot from being freed.
            let _ = ps.stop().await;
        }
    }

    /// Ensure at least one free slot exists, evicting LRU heads if the mux
    /// is at capacity. Fails with `AllHeld` if every slot is held.
    async fn ensure_slot(&mut self) -> Result<(), MuxError> {
        while self.slots.len() >= self.max_slots {
            self.evict().await?;
        }
        Ok(())
    }

    async fn evict(&mut self) -> Result<(), MuxError> {
        let victim = self
            .lru
            .pop_front()
            .ok_or(MuxError::AllHeld(self.max_slots))?;
        let Some(mut ps) = self.slots.remove(&victim) else {
            // An id only ever enters `lru` via `release`, which requires it
            // to be in `slots` first; it cannot have been removed since.
            // Nothing was freed, so the caller's loop tries the next head.
            return Ok(());
        };
        let blob = ps.suspend().await?;
        let mut session: Session = self.store.load(victim)?;
        session.suspend(blob.clone())?;
        self.store.save(&session)?;
        if let Some(cb) = &self.on_evict {
            cb(victim, blob.len());
        }
        let _ = ps.stop().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mux_tests.rs"]
mod tests;
