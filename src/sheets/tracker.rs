//! Seen-row bookkeeping for the poller.

use std::collections::HashSet;

use super::row::SheetRow;

/// Set of row identity keys that have already been handled.
///
/// Diffing by key rather than by row count means deleted, reordered, or
/// edited rows never hide genuinely new submissions.
#[derive(Debug, Default, Clone)]
pub struct RowTracker {
    seen: HashSet<String>,
}

impl RowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            seen: keys.into_iter().collect(),
        }
    }

    /// Rows whose key has not been seen, in sheet order. Rows sharing a key
    /// within one fetch are returned once.
    pub fn diff(&self, rows: Vec<SheetRow>) -> Vec<SheetRow> {
        let mut batch = HashSet::new();
        rows.into_iter()
            .filter(|row| {
                let key = row.identity_key();
                !self.seen.contains(&key) && batch.insert(key)
            })
            .collect()
    }

    pub fn mark_seen(&mut self, key: String) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
