//! Specialized collection types

use std::collections::HashMap;

pub use slotmap::{Key, SlotMap};

/// Slot map whose entries can also be found by a unique string name.
///
/// Handles are generational, so a handle to a removed entry never aliases a
/// newer one.
#[derive(Debug)]
pub struct NamedArena<K: Key, V> {
    items: SlotMap<K, V>,
    names: HashMap<String, K>,
}

impl<K: Key, V> NamedArena<K, V> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self {
            items: SlotMap::with_key(),
            names: HashMap::new(),
        }
    }

    /// Insert a value under `name`. A previous entry with the same name keeps
    /// its handle valid but is no longer reachable by name.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> K {
        let key = self.items.insert(value);
        self.names.insert(name.into(), key);
        key
    }

    /// Look up a handle by name
    pub fn find(&self, name: &str) -> Option<K> {
        self.names.get(name).copied().filter(|key| self.items.contains_key(*key))
    }

    /// Get an entry
    pub fn get(&self, key: K) -> Option<&V> {
        self.items.get(key)
    }

    /// Get a mutable entry
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.items.get_mut(key)
    }

    /// Remove an entry and its name binding
    pub fn remove(&mut self, key: K) -> Option<V> {
        self.names.retain(|_, k| *k != key);
        self.items.remove(key)
    }

    /// Whether the handle still refers to a live entry
    pub fn contains(&self, key: K) -> bool {
        self.items.contains_key(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over live entries
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.items.iter()
    }

    /// Remove every entry, yielding the values
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.names.clear();
        self.items.drain()
    }
}

impl<K: Key, V> Default for NamedArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    slotmap::new_key_type! { struct TestKey; }

    #[test]
    fn test_find_by_name() {
        let mut arena: NamedArena<TestKey, u32> = NamedArena::new();
        let a = arena.insert("a", 1);
        let b = arena.insert("b", 2);
        assert_eq!(arena.find("a"), Some(a));
        assert_eq!(arena.find("b"), Some(b));
        assert_eq!(arena.find("c"), None);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_removed_handle_is_stale() {
        let mut arena: NamedArena<TestKey, u32> = NamedArena::new();
        let a = arena.insert("a", 1);
        assert_eq!(arena.remove(a), Some(1));
        assert!(!arena.contains(a));
        assert_eq!(arena.find("a"), None);

        let again = arena.insert("a", 3);
        assert_ne!(a, again);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(again), Some(&3));
    }
}
