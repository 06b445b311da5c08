//! Integer handles with a null fallback entry.
//!
//! [`HandleTable`] maps [`AudioId`]s to entries and always owns one extra
//! "null" entry under [`AudioId::NULL`]. Lookups of unknown or released ids
//! resolve to that null entry, so callers holding stale handles keep working
//! against something harmless instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque handle to a managed voice. Zero is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AudioId(u64);

impl AudioId {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Id-to-entry map whose misses resolve to a null entry.
pub struct HandleTable<T> {
    null: T,
    entries: HashMap<AudioId, T>,
    next_id: u64,
}

impl<T> HandleTable<T> {
    pub fn new(null: T) -> Self {
        Self {
            null,
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store `entry` under a fresh id. Ids are never reused.
    pub fn insert(&mut self, entry: T) -> AudioId {
        let id = AudioId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    /// Whether `id` names a live, non-null entry.
    pub fn contains(&self, id: AudioId) -> bool {
        !id.is_null() && self.entries.contains_key(&id)
    }

    /// Entry for `id`, or the null entry.
    pub fn get(&self, id: AudioId) -> &T {
        self.entries.get(&id).unwrap_or(&self.null)
    }

    pub fn get_mut(&mut self, id: AudioId) -> &mut T {
        match self.entries.get_mut(&id) {
            Some(entry) => entry,
            None => &mut self.null,
        }
    }

    /// Remove a live entry. The null entry cannot be removed.
    pub fn remove(&mut self, id: AudioId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn null(&self) -> &T {
        &self.null
    }

    pub fn null_mut(&mut self) -> &mut T {
        &mut self.null
    }

    /// Number of live entries, not counting the null entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<AudioId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every entry including the null entry.
    pub fn iter_all_mut(&mut self) -> impl Iterator<Item = &mut T> {
        std::iter::once(&mut self.null).chain(self.entries.values_mut())
    }

    /// Drop every live entry, keeping the null entry.
    pub fn clear(&mut self) -> Vec<T> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}

impl<T> fmt::Debug for HandleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut table = HandleTable::new("null");
        let a = table.insert("a");
        let b = table.insert("b");
        assert_ne!(a, b);
        assert!(!a.is_null());
        assert_eq!(*table.get(a), "a");
        assert_eq!(*table.get(b), "b");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unknown_ids_resolve_to_null() {
        let mut table = HandleTable::new(0);
        assert_eq!(*table.get(AudioId::NULL), 0);
        assert_eq!(*table.get(AudioId::from_raw(99)), 0);
        *table.get_mut(AudioId::from_raw(99)) += 1;
        assert_eq!(*table.null(), 1);
        assert!(!table.contains(AudioId::NULL));
    }

    #[test]
    fn test_remove_is_final_and_ids_not_reused() {
        let mut table = HandleTable::new("null");
        let a = table.insert("a");
        assert_eq!(table.remove(a), Some("a"));
        assert_eq!(table.remove(a), None);
        assert_eq!(*table.get(a), "null");

        let b = table.insert("b");
        assert_ne!(a, b);
        assert_eq!(table.remove(AudioId::NULL), None);
    }

    #[test]
    fn test_clear_keeps_null() {
        let mut table = HandleTable::new(String::from("null"));
        table.insert(String::from("a"));
        table.insert(String::from("b"));
        let drained = table.clear();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        assert_eq!(table.iter_all_mut().count(), 1);
    }

    #[test]
    fn test_ids_sorted() {
        let mut table = HandleTable::new(());
        let ids: Vec<_> = (0..5).map(|_| table.insert(())).collect();
        assert_eq!(table.ids(), ids);
    }
}
