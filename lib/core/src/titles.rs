//! Title lookup.
//!
//! Keys are normalized titles (trimmed, lowercased). When two raw titles
//! normalize to the same key the last id written wins; the key keeps the
//! position of its first appearance so `search` order stays stable.

use crate::{Error, Result};
use ahash::AHashMap;
use tracing::warn;

/// Normalize a raw title into a lookup key.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw_title: &str) -> String {
    raw_title.trim().to_lowercase()
}

#[derive(Debug, Clone)]
struct TitleEntry {
    key: String,
    display: String,
    id: usize,
}

/// Bidirectional mapping between normalized titles and item ids
#[derive(Debug, Clone, Default)]
pub struct TitleRegistry {
    /// Insertion order of distinct keys
    entries: Vec<TitleEntry>,
    key_to_entry: AHashMap<String, usize>,
    id_to_display: AHashMap<usize, String>,
    collisions: usize,
}

impl TitleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(raw title, id)` pairs in document order.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for (raw, id) in pairs {
            registry.insert(raw.as_ref(), id);
        }
        registry
    }

    /// Insert one mapping. Returns the id previously held by the same key.
    pub fn insert(&mut self, raw_title: &str, id: usize) -> Option<usize> {
        let key = normalize(raw_title);
        let display = raw_title.trim().to_string();
        self.id_to_display.insert(id, display.clone());

        if let Some(&pos) = self.key_to_entry.get(&key) {
            let entry = &mut self.entries[pos];
            let previous = entry.id;
            entry.id = id;
            entry.display = display;
            warn!(
                "duplicate title key {:?}: id {} replaced by id {} ({:?})",
                key, previous, id, &entry.display
            );
            self.collisions += 1;
            return Some(previous);
        }

        self.key_to_entry.insert(key.clone(), self.entries.len());
        self.entries.push(TitleEntry { key, display, id });
        None
    }

    /// Look up a raw title. `None` means "not found", never an error.
    pub fn resolve(&self, raw_title: &str) -> Option<usize> {
        self.key_to_entry
            .get(&normalize(raw_title))
            .map(|&pos| self.entries[pos].id)
    }

    pub fn contains(&self, raw_title: &str) -> bool {
        self.resolve(raw_title).is_some()
    }

    /// Display title of an item. An unknown id means the mapping and the
    /// catalog drifted apart.
    pub fn display_title(&self, id: usize) -> Result<&str> {
        self.id_to_display
            .get(&id)
            .map(String::as_str)
            .ok_or_else(|| Error::InvariantViolation(format!("no title registered for item id {}", id)))
    }

    /// Case-insensitive substring search in insertion order, not ranked.
    pub fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let needle = normalize(query);
        self.entries
            .iter()
            .filter(|entry| entry.key.contains(&needle))
            .take(limit)
            .map(|entry| entry.display.clone())
            .collect()
    }

    /// Number of distinct keys
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many inserts replaced an existing key
    #[inline]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Largest id referenced by any title
    pub fn max_id(&self) -> Option<usize> {
        self.id_to_display.keys().copied().max()
    }
}
