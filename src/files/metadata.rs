//! Filename → upload metadata.

use crate::store::{InMemoryStore, RecordStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata for one uploaded file. Same-name uploads replace the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploader: String,
}

pub struct MetadataStore {
    records: Arc<dyn RecordStore<FileRecord>>,
}

impl MetadataStore {
    pub fn new(records: Arc<dyn RecordStore<FileRecord>>) -> Self {
        Self { records }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Insert or replace (last write wins). Returns the replaced record, if any.
    pub fn put(&self, record: FileRecord) -> Option<FileRecord> {
        self.records.put(record.filename.clone(), record)
    }

    pub fn get(&self, filename: &str) -> Option<FileRecord> {
        self.records.get(filename)
    }

    /// All records, sorted by filename.
    pub fn list(&self) -> Vec<FileRecord> {
        let mut records = self.records.list();
        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(filename: &str, uploader: &str, secs: i64) -> FileRecord {
        FileRecord {
            filename: filename.into(),
            uploaded_at: Utc.timestamp_opt(secs, 0).single().unwrap(),
            uploader: uploader.into(),
        }
    }

    #[test]
    fn put_then_get() {
        let store = MetadataStore::in_memory();
        assert!(store.put(record("a.txt", "alice", 1)).is_none());
        assert_eq!(store.get("a.txt"), Some(record("a.txt", "alice", 1)));
        assert!(store.get("missing.txt").is_none());
    }

    #[test]
    fn same_filename_last_write_wins() {
        let store = MetadataStore::in_memory();
        store.put(record("a.txt", "alice", 1));
        let previous = store.put(record("a.txt", "bob", 2));
        assert_eq!(previous.unwrap().uploader, "alice");
        assert_eq!(store.get("a.txt").unwrap().uploader, "bob");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_is_sorted_by_filename() {
        let store = MetadataStore::in_memory();
        store.put(record("c.txt", "alice", 1));
        store.put(record("a.txt", "alice", 2));
        store.put(record("b.txt", "bob", 3));
        let names: Vec<_> = store.list().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn record_serializes_with_rfc3339_timestamp() {
        let json = serde_json::to_value(record("a.txt", "alice", 0)).unwrap();
        assert_eq!(json["filename"], "a.txt");
        assert_eq!(json["uploader"], "alice");
        assert_eq!(json["uploaded_at"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn concurrent_readers_never_see_torn_records() {
        let store = MetadataStore::in_memory();
        store.put(record("shared.bin", "user0", 0));

        std::thread::scope(|s| {
            for writer in 0..8i64 {
                let store = &store;
                s.spawn(move || {
                    for round in 0..200i64 {
                        let i = writer * 1_000 + round;
                        store.put(record("shared.bin", &format!("user{i}"), i));
                    }
                });
            }
            for _ in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for _ in 0..500 {
                        let seen = store.get("shared.bin").unwrap();
                        // Every writer keeps uploader and timestamp in lockstep.
                        let expected = format!("user{}", seen.uploaded_at.timestamp());
                        assert_eq!(seen.uploader, expected);
                        assert_eq!(seen.filename, "shared.bin");
                    }
                });
            }
        });

        assert_eq!(store.len(), 1);
    }
}
