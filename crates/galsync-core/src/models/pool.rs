use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A previously stored title, as kept in the local snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolEntry {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PoolEntry {
    pub fn new(title: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            id: id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Entries without a title or id cannot be matched or updated.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.id.trim().is_empty()
    }
}

/// Working set of known titles used for duplicate detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    entries: Vec<PoolEntry>,
}

impl CandidatePool {
    pub fn new(entries: Vec<PoolEntry>) -> Self {
        Self {
            entries: entries.into_iter().filter(PoolEntry::is_usable).collect(),
        }
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry. Returns `false` when it is unusable or its id is
    /// already present.
    pub fn push(&mut self, entry: PoolEntry) -> bool {
        if !entry.is_usable() || self.entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Drop every entry whose id is in `ids`. Returns how many were removed.
    pub fn remove_ids(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(&e.id));
        before - self.entries.len()
    }

    /// Order-insensitive fingerprint of the pool's content.
    pub fn content_hash(&self) -> u64 {
        let mut keys: Vec<(&str, &str, Option<&str>)> = self
            .entries
            .iter()
            .map(|e| (e.id.as_str(), e.title.as_str(), e.url.as_deref()))
            .collect();
        keys.sort_unstable();

        let mut hasher = DefaultHasher::new();
        keys.hash(&mut hasher);
        hasher.finish()
    }
}
