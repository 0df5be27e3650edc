//! Ordered file registry with selection
//!
//! Insertion order is display order. The registry only knows about entries
//! and the selected index set; handles and other per-index state live with
//! the session, which applies the same shift rule to them on removal.

use crate::error::{BatchDocError, CapacityViolation, Result};
use crate::media::FileEntry;
use crate::reindex::IndexSet;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;
use tracing::debug;

/// Memory warning threshold, percent of the budget
pub const MEMORY_WARNING_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
    pub max_files: usize,
    pub max_total_bytes: u64,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        Self {
            max_files: 200,
            max_total_bytes: 500 * 1024 * 1024,
        }
    }
}

/// Memory usage summary for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub used_bytes: u64,
    pub budget_bytes: u64,
    pub percent: f64,
    pub file_count: usize,
    /// Over the warning threshold
    pub warning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    entries: Vec<FileEntry>,
    selected: IndexSet,
    limits: CapacityLimits,
    total_bytes: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(CapacityLimits::default())
    }
}

impl Registry {
    pub fn new(limits: CapacityLimits) -> Self {
        Self {
            entries: Vec::new(),
            selected: IndexSet::new(),
            limits,
            total_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn limits(&self) -> CapacityLimits {
        self.limits
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Check whether `incoming` would fit; memory is checked before count
    pub fn check_capacity(&self, incoming: &[FileEntry]) -> std::result::Result<(), CapacityViolation> {
        let incoming_bytes: u64 = incoming.iter().map(FileEntry::size_bytes).sum();
        let attempted_bytes = self.total_bytes.saturating_add(incoming_bytes);
        if attempted_bytes > self.limits.max_total_bytes {
            return Err(CapacityViolation::Memory {
                limit_bytes: self.limits.max_total_bytes,
                attempted_bytes,
                available_bytes: self.limits.max_total_bytes.saturating_sub(self.total_bytes),
            });
        }

        let attempted = self.entries.len() + incoming.len();
        if attempted > self.limits.max_files {
            return Err(CapacityViolation::FileCount {
                limit: self.limits.max_files,
                attempted,
                available: self.limits.max_files.saturating_sub(self.entries.len()),
            });
        }

        Ok(())
    }

    /// Append a batch, all or nothing.
    ///
    /// Returns the range of indices the new entries occupy.
    pub fn append(&mut self, incoming: Vec<FileEntry>) -> Result<Range<usize>> {
        self.check_capacity(&incoming)?;

        let start = self.entries.len();
        self.total_bytes += incoming.iter().map(FileEntry::size_bytes).sum::<u64>();
        self.entries.extend(incoming);
        debug!(start, end = self.entries.len(), total_bytes = self.total_bytes, "Appended files");
        Ok(start..self.entries.len())
    }

    /// Splice out `index` and shift the selection.
    ///
    /// Out-of-range indices are a no-op. Callers holding other per-index
    /// state must apply the same shift; see `Session::remove_at`.
    pub fn remove_at(&mut self, index: usize) -> Option<FileEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.total_bytes -= removed.size_bytes();
        self.selected.apply_removal(index);
        Some(removed)
    }

    /// Swap in a new entry at `index`; selection is unchanged
    pub fn replace_at(&mut self, index: usize, entry: FileEntry) -> Option<FileEntry> {
        let slot = self.entries.get_mut(index)?;
        self.total_bytes = self.total_bytes - slot.size_bytes() + entry.size_bytes();
        Some(std::mem::replace(slot, entry))
    }

    /// Validate a permutation where `order[new] == old`
    pub fn check_order(&self, order: &[usize]) -> Result<()> {
        if order.len() != self.entries.len() {
            return Err(BatchDocError::InvalidOrder(format!(
                "expected {} indices, got {}",
                self.entries.len(),
                order.len()
            )));
        }
        let mut seen = HashSet::with_capacity(order.len());
        for &old in order {
            if old >= self.entries.len() {
                return Err(BatchDocError::InvalidOrder(format!("index {} out of range", old)));
            }
            if !seen.insert(old) {
                return Err(BatchDocError::InvalidOrder(format!("index {} repeated", old)));
            }
        }
        Ok(())
    }

    /// Reorder entries and selection together
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        self.check_order(order)?;
        let mut old: Vec<Option<FileEntry>> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(Some)
            .collect();
        self.entries = order
            .iter()
            .filter_map(|&i| old.get_mut(i).and_then(Option::take))
            .collect();
        self.selected.apply_permutation(order);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected.clear();
        self.total_bytes = 0;
    }

    // Selection

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(index)
    }

    /// Flip one index; out of range is ignored
    pub fn toggle(&mut self, index: usize) {
        if index >= self.entries.len() {
            return;
        }
        if !self.selected.remove(index) {
            self.selected.insert(index);
        }
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.entries.len()).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn invert(&mut self) {
        self.selected = (0..self.entries.len())
            .filter(|i| !self.selected.contains(*i))
            .collect();
    }

    /// Replace the selection; out-of-range indices are dropped
    pub fn set_selection<I: IntoIterator<Item = usize>>(&mut self, indices: I) {
        let len = self.entries.len();
        self.selected = indices.into_iter().filter(|&i| i < len).collect();
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Ascending
    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected.to_vec()
    }

    /// Selected entries in registry order
    pub fn selected_entries(&self) -> Vec<(usize, &FileEntry)> {
        self.selected
            .iter()
            .filter_map(|i| self.entries.get(i).map(|e| (i, e)))
            .collect()
    }

    /// Selected entries, or every entry when nothing is selected
    pub fn selection_or_all(&self) -> Vec<(usize, &FileEntry)> {
        if self.selected.is_empty() {
            self.entries.iter().enumerate().collect()
        } else {
            self.selected_entries()
        }
    }

    /// First index whose name matches
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        let budget = self.limits.max_total_bytes;
        let percent = if budget == 0 {
            0.0
        } else {
            self.total_bytes as f64 / budget as f64 * 100.0
        };
        MemoryUsage {
            used_bytes: self.total_bytes,
            budget_bytes: budget,
            percent,
            file_count: self.entries.len(),
            warning: percent > MEMORY_WARNING_PERCENT,
        }
    }
}
