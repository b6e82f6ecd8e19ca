//! Snapshot repositories.
//!
//! Entities are immutable snapshots; a repository maps a key to the current
//! snapshot and replacing an entry is the only way an entity changes.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key -> current snapshot mapping.
pub trait Repository<K, V> {
    fn get(&self, key: &K) -> Option<&V>;

    /// Store `value` as the current snapshot for `key`, returning the previous one.
    fn put(&mut self, key: K, value: V) -> Option<V>;

    fn len(&self) -> usize;

    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered in-memory repository.
///
/// Serializes as a list of `[key, value]` pairs so composite keys survive
/// formats that only allow string map keys.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRepository<K: Ord, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> MemoryRepository<K, V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

impl<K: Ord, V> Default for MemoryRepository<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Repository<K, V> for MemoryRepository<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for MemoryRepository<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K, V> Serialize for MemoryRepository<K, V>
where
    K: Ord + Serialize,
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de, K, V> Deserialize<'de> for MemoryRepository<K, V>
where
    K: Ord + Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
