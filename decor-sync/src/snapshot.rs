//! The set of resources a reconciler has decorated.

use std::collections::BTreeMap;

use decor_core::types::ResourceUri;

/// Canonical resource string → resource identifier.
///
/// Ordered so that stale clears are issued deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSnapshot {
    entries: BTreeMap<String, ResourceUri>,
}

impl DecorationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `uri`. Returns `false` if it was already present.
    pub fn insert(&mut self, uri: &ResourceUri) -> bool {
        self.entries.insert(uri.canonical(), uri.clone()).is_none()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical keys, ascending.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resources present here but absent from `next`, ascending by key.
    pub fn stale_in(&self, next: &DecorationSnapshot) -> Vec<ResourceUri> {
        self.entries
            .iter()
            .filter(|(key, _)| !next.entries.contains_key(*key))
            .map(|(_, uri)| uri.clone())
            .collect()
    }
}
