//! Bounded history of selection snapshots, matched back by file name

use crate::registry::Registry;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSnapshot {
    pub file_names: Vec<String>,
    pub taken_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    history: VecDeque<SelectionSnapshot>,
    capacity: usize,
    can_restore: bool,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            can_restore: false,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn latest(&self) -> Option<&SelectionSnapshot> {
        self.history.back()
    }

    /// A restore is on offer until it has been used or the history cleared
    pub fn can_restore(&self) -> bool {
        self.can_restore && !self.history.is_empty()
    }

    /// Record the current selection by name, evicting the oldest beyond capacity
    pub fn save(&mut self, registry: &Registry, now_ms: u64) {
        let file_names = registry
            .selected_entries()
            .into_iter()
            .map(|(_, e)| e.name().to_string())
            .collect();

        self.history.push_back(SelectionSnapshot {
            file_names,
            taken_at_ms: now_ms,
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.can_restore = true;
        debug!(depth = self.history.len(), "Saved selection snapshot");
    }

    /// Reapply the most recent snapshot.
    ///
    /// Each saved name selects the first entry carrying it; names no longer
    /// present are dropped. Returns the resulting selection size. Nothing
    /// changes when there is no snapshot or the registry is empty.
    pub fn restore(&self, registry: &mut Registry) -> usize {
        let Some(snapshot) = self.history.back() else {
            return 0;
        };
        if registry.is_empty() {
            return 0;
        }

        let indices: Vec<usize> = snapshot
            .file_names
            .iter()
            .filter_map(|name| registry.position_by_name(name))
            .collect();
        registry.set_selection(indices);
        registry.selected_count()
    }

    /// Mark the offered restore as used
    pub fn consume(&mut self) {
        self.can_restore = false;
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.can_restore = false;
    }
}
