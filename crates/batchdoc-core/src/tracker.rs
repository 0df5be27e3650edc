//! Resource tracker: host handles derived from registry slots
//!
//! A handle is whatever the host hands out for a payload (a browser object
//! URL, a native id). The tracker records which registry index produced each
//! handle so removal, replacement and teardown release every one of them
//! exactly once.

use crate::error::CollaboratorError;
use crate::reindex::{IndexedResource, ReindexableMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Opaque host handle id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub String);

impl HandleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("handle {0} was already released")]
    AlreadyReleased(HandleId),

    #[error("handle {0} is unknown")]
    Unknown(HandleId),

    #[error("host failed to release {handle}: {message}")]
    Host { handle: HandleId, message: String },
}

/// Host-side allocation of handles
pub trait HandleAllocator {
    fn allocate(&mut self, payload: &[u8], mime: &str) -> Result<HandleId, CollaboratorError>;

    fn release(&mut self, handle: &HandleId) -> Result<(), ReleaseError>;
}

/// In-process allocator used natively and in tests
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    next_id: u64,
    live: HashSet<HandleId>,
    released: HashSet<HandleId>,
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, handle: &HandleId) -> bool {
        self.live.contains(handle)
    }
}

impl HandleAllocator for MemoryAllocator {
    fn allocate(&mut self, _payload: &[u8], _mime: &str) -> Result<HandleId, CollaboratorError> {
        let id = HandleId(format!("mem:{}", self.next_id));
        self.next_id += 1;
        self.live.insert(id.clone());
        Ok(id)
    }

    fn release(&mut self, handle: &HandleId) -> Result<(), ReleaseError> {
        if self.live.remove(handle) {
            self.released.insert(handle.clone());
            Ok(())
        } else if self.released.contains(handle) {
            Err(ReleaseError::AlreadyReleased(handle.clone()))
        } else {
            Err(ReleaseError::Unknown(handle.clone()))
        }
    }
}

/// Registry index -> handles, plus handles not tied to any slot
pub struct ResourceTracker<A: HandleAllocator> {
    allocator: A,
    by_index: ReindexableMap<Vec<HandleId>>,
    unindexed: Vec<HandleId>,
}

impl<A: HandleAllocator> ResourceTracker<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            by_index: ReindexableMap::new(),
            unindexed: Vec::new(),
        }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Allocate a handle owned by registry slot `index`
    pub fn allocate(
        &mut self,
        index: usize,
        payload: &[u8],
        mime: &str,
    ) -> Result<HandleId, CollaboratorError> {
        let handle = self.allocator.allocate(payload, mime)?;
        debug!(index, handle = %handle, "Allocated handle");
        self.by_index
            .entry_or_default(index)
            .push(handle.clone());
        Ok(handle)
    }

    /// Allocate a handle that lives until `release_all` (download artifacts)
    pub fn allocate_unindexed(
        &mut self,
        payload: &[u8],
        mime: &str,
    ) -> Result<HandleId, CollaboratorError> {
        let handle = self.allocator.allocate(payload, mime)?;
        debug!(handle = %handle, "Allocated unindexed handle");
        self.unindexed.push(handle.clone());
        Ok(handle)
    }

    pub fn handles_for(&self, index: usize) -> &[HandleId] {
        self.by_index.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Release everything held for `index`; other keys are not shifted
    pub fn release_index(&mut self, index: usize) {
        if let Some(handles) = self.by_index.remove(index) {
            for handle in handles {
                self.release_one(&handle);
            }
        }
    }

    /// Shift keys after `removed` has been spliced out of the registry.
    ///
    /// Anything still held for `removed` is released first.
    pub fn reindex(&mut self, removed: usize) {
        if let Some(handles) = self.by_index.apply_removal(removed) {
            for handle in handles {
                self.release_one(&handle);
            }
        }
    }

    pub fn permute(&mut self, order: &[usize]) {
        self.by_index.apply_permutation(order);
    }

    pub fn release_all(&mut self) {
        let indexed: Vec<HandleId> = self
            .by_index
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect();
        let unindexed = std::mem::take(&mut self.unindexed);

        for handle in indexed.iter().chain(unindexed.iter()) {
            self.release_one(handle);
        }
    }

    pub fn tracked_indices(&self) -> Vec<usize> {
        self.by_index.keys().collect()
    }

    /// Handle count across indexed and unindexed slots
    pub fn tracked_count(&self) -> usize {
        self.by_index.iter().map(|(_, h)| h.len()).sum::<usize>() + self.unindexed.len()
    }

    fn release_one(&mut self, handle: &HandleId) {
        match self.allocator.release(handle) {
            Ok(()) => debug!(handle = %handle, "Released handle"),
            Err(e) => warn!(error = %e, "Handle release skipped"),
        }
    }
}

impl<A: HandleAllocator> IndexedResource for ResourceTracker<A> {
    fn release_index(&mut self, index: usize) {
        ResourceTracker::release_index(self, index);
    }

    fn apply_removal(&mut self, removed: usize) {
        self.reindex(removed);
    }

    fn apply_permutation(&mut self, order: &[usize]) {
        self.permute(order);
    }

    fn release_all(&mut self) {
        ResourceTracker::release_all(self);
    }
}

impl<A: HandleAllocator> Drop for ResourceTracker<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<A: HandleAllocator + fmt::Debug> fmt::Debug for ResourceTracker<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("allocator", &self.allocator)
            .field("by_index", &self.by_index)
            .field("unindexed", &self.unindexed)
            .finish()
    }
}
