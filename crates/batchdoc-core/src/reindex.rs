//! Index-keyed side maps that follow the registry through removals and reorders
//!
//! Every structure keyed by a registry position (selection, tracked handles,
//! decoded previews) goes through [`ReindexableMap`] so a single shift rule
//! applies everywhere:
//!
//! - the removed key is dropped
//! - keys greater than the removed key move down by one
//! - keys below it are untouched

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexableMap<V> {
    inner: BTreeMap<usize, V>,
}

impl<V> Default for ReindexableMap<V> {
    fn default() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }
}

impl<V> ReindexableMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, value: V) -> Option<V> {
        self.inner.insert(index, value)
    }

    pub fn get(&self, index: usize) -> Option<&V> {
        self.inner.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        self.inner.get_mut(&index)
    }

    pub fn entry_or_default(&mut self, index: usize) -> &mut V
    where
        V: Default,
    {
        self.inner.entry(index).or_default()
    }

    pub fn remove(&mut self, index: usize) -> Option<V> {
        self.inner.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &V)> + '_ {
        self.inner.iter().map(|(k, v)| (*k, v))
    }

    pub fn max_key(&self) -> Option<usize> {
        self.inner.keys().next_back().copied()
    }

    /// Take every value out, leaving the map empty
    pub fn drain(&mut self) -> impl Iterator<Item = (usize, V)> {
        std::mem::take(&mut self.inner).into_iter()
    }

    /// Apply the shift rule for a removal at `removed`.
    ///
    /// Returns the value that was stored at `removed`, if any.
    pub fn apply_removal(&mut self, removed: usize) -> Option<V> {
        let dropped = self.inner.remove(&removed);
        let above = self.inner.split_off(&removed);
        for (key, value) in above {
            self.inner.insert(key - 1, value);
        }
        dropped
    }

    /// Re-key by a permutation where `order[new_index] == old_index`.
    ///
    /// Keys not mentioned by `order` are discarded.
    pub fn apply_permutation(&mut self, order: &[usize]) {
        let mut old = std::mem::take(&mut self.inner);
        for (new_index, old_index) in order.iter().enumerate() {
            if let Some(value) = old.remove(old_index) {
                self.inner.insert(new_index, value);
            }
        }
    }

    /// Drop every key at or beyond `len`
    pub fn truncate(&mut self, len: usize) -> Vec<(usize, V)> {
        self.inner.split_off(&len).into_iter().collect()
    }
}

/// Set of registry positions, shifted by the same rule as every other side map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    map: ReindexableMap<()>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize) -> bool {
        self.map.insert(index, ()).is_none()
    }

    pub fn remove(&mut self, index: usize) -> bool {
        self.map.remove(index).is_some()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.map.contains(index)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map = ReindexableMap::new();
    }

    /// Ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    pub fn max(&self) -> Option<usize> {
        self.map.max_key()
    }

    pub fn apply_removal(&mut self, removed: usize) -> bool {
        self.map.apply_removal(removed).is_some()
    }

    pub fn apply_permutation(&mut self, order: &[usize]) {
        self.map.apply_permutation(order);
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

/// Anything holding per-index state that must follow registry mutations
pub trait IndexedResource {
    /// Release whatever is held for `index` without shifting others
    fn release_index(&mut self, index: usize);

    /// Shift keys after `removed` has been spliced out
    fn apply_removal(&mut self, removed: usize);

    /// Re-key after a reorder (`order[new] == old`)
    fn apply_permutation(&mut self, order: &[usize]);

    fn release_all(&mut self);
}
