//! Generation history: the last N generated card-news sets.
//!
//! Stored as one pretty-printed JSON array, newest first, capped at the
//! configured limit. History is a convenience view, not a source of
//! truth — load failures degrade to an empty list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One completed generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Timestamp-derived id (`YYYYMMDDHHMMSS`).
    pub id: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
    /// The topic as the user typed it (pre-research).
    pub text: String,
    pub slide_count: u32,
    pub html: String,
}

/// File-backed history store.
pub struct HistoryStore {
    path: PathBuf,
    limit: usize,
}

impl HistoryStore {
    /// Store at `<dir>/history.json`, keeping at most `limit` entries.
    pub fn new(dir: &Path, limit: usize) -> Self {
        Self {
            path: dir.join("history.json"),
            limit,
        }
    }

    /// All entries, newest first.
    pub fn load(&self) -> Vec<HistoryEntry> {
        if !self.path.exists() {
            return Vec::new();
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "History file unreadable");
                return Vec::new();
            }
        };
        if content.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "History file corrupt, starting empty");
                Vec::new()
            }
        }
    }

    /// Prepend a new entry (id and timestamp assigned here) and persist,
    /// dropping anything beyond the limit.
    pub fn append(&self, text: &str, slide_count: u32, html: &str) -> anyhow::Result<HistoryEntry> {
        let now = chrono::Local::now();
        let entry = HistoryEntry {
            id: now.format("%Y%m%d%H%M%S").to_string(),
            timestamp: now.to_rfc3339(),
            text: text.to_string(),
            slide_count,
            html: html.to_string(),
        };

        let mut entries = self.load();
        entries.insert(0, entry.clone());
        entries.truncate(self.limit);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), 20);
        assert!(store.load().is_empty());
    }

    #[test]
    fn append_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), 20);

        store.append("first topic", 5, "<div>1</div>").unwrap();
        store.append("second topic", 3, "<div>2</div>").unwrap();

        let entries = store.load();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "second topic");
        assert_eq!(entries[1].text, "first topic");
    }

    #[test]
    fn limit_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path(), 3);

        for i in 0..5 {
            store.append(&format!("topic {i}"), 5, "<div/>").unwrap();
        }

        let entries = store.load();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "topic 4");
        assert_eq!(entries[2].text, "topic 2");
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("history.json"), "[{broken").unwrap();
        let store = HistoryStore::new(dir.path(), 20);
        assert!(store.load().is_empty());
    }
}
