//! Test fixtures and index helpers.
//!
//! Provides ready-made services over the in-memory engine and helpers to
//! look at the raw index state a test produced.

use docindex_core::{
    index::codec::{decode_ancestor, decode_posting, DecodedPosting},
    IndexConfig, IndexService, ServiceConfig, TableNames,
};
use docindex_kv::{InMemoryEngine, KvEngine, ScanRange, SnapshotDir};
use tempfile::TempDir;

/// Configuration used by fixtures: default limits, no retry wait.
pub fn fast_config() -> IndexConfig {
    IndexConfig::new().retry_wait_ms(0)
}

/// An index service over a fresh in-memory engine.
pub struct TestIndex {
    /// The service instance.
    pub service: IndexService<InMemoryEngine>,
}

impl TestIndex {
    /// Creates a fixture with [`fast_config`].
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    /// Creates a fixture with the given global configuration.
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            service: IndexService::with_config(InMemoryEngine::new(), ServiceConfig::new(config)),
        }
    }

    /// Returns every posting of a namespace, decoded, in key order.
    pub fn postings(&self, namespace: &str) -> Vec<DecodedPosting> {
        let table = TableNames::new(namespace).index;
        scan_all(self.service.engine(), &table)
            .into_iter()
            .map(|(key, _)| decode_posting(&key).expect("posting key should decode"))
            .collect()
    }

    /// Returns the raw posting keys of a namespace.
    pub fn posting_keys(&self, namespace: &str) -> Vec<Vec<u8>> {
        let table = TableNames::new(namespace).index;
        scan_all(self.service.engine(), &table)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    /// Returns the ancestor record of a document, if any.
    pub fn ancestor(&self, namespace: &str, document_id: &str) -> Option<Vec<Vec<u8>>> {
        let table = TableNames::new(namespace).ancestor;
        self.service
            .engine()
            .get(&table, document_id.as_bytes())
            .expect("ancestor read should succeed")
            .map(|bytes| decode_ancestor(&bytes).expect("ancestor record should decode"))
    }

    /// Returns the engine's committed version.
    pub fn version(&self) -> u64 {
        self.service.engine().version()
    }
}

impl Default for TestIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestIndex {
    type Target = IndexService<InMemoryEngine>;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

/// Scans a whole table.
pub fn scan_all<E: KvEngine>(engine: &E, table: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut items = Vec::new();
    let mut cursor = None;
    loop {
        let page = engine
            .scan(table, &ScanRange::all().with_cursor(cursor), 256)
            .expect("scan should succeed");
        items.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return items,
        }
    }
}

/// Runs a test with a fresh index fixture.
///
/// # Example
///
/// ```rust
/// use docindex_core::FieldRecord;
/// use docindex_testkit::with_test_index;
///
/// with_test_index(|index| {
///     index
///         .apply_index("acme", vec![FieldRecord::new("d1", "", "a", "1")], false, false)
///         .unwrap();
///     assert_eq!(index.postings("acme").len(), 1);
/// });
/// ```
pub fn with_test_index<F, R>(f: F) -> R
where
    F: FnOnce(&TestIndex) -> R,
{
    let index = TestIndex::new();
    f(&index)
}

/// A temporary snapshot directory.
pub struct TestSnapshotDir {
    temp_dir: TempDir,
}

impl TestSnapshotDir {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Opens the directory, taking its lock.
    pub fn open(&self) -> SnapshotDir {
        SnapshotDir::open(self.path(), true).expect("Failed to open snapshot directory")
    }
}

impl Default for TestSnapshotDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_core::FieldRecord;

    #[test]
    fn fixture_exposes_postings() {
        let index = TestIndex::new();
        index
            .apply_index("acme", vec![FieldRecord::new("d1", "", "a", "1")], false, false)
            .unwrap();
        let postings = index.postings("acme");
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].selfid, "d1");
        assert_eq!(index.ancestor("acme", "d1").unwrap().len(), 1);
        assert!(index.ancestor("acme", "d2").is_none());
    }

    #[test]
    fn scan_all_follows_cursors() {
        let engine = InMemoryEngine::new();
        let mut txn = engine.begin().unwrap();
        for i in 0..600u32 {
            engine.put(&mut txn, "t", &i.to_be_bytes(), b"v").unwrap();
        }
        engine.commit(txn).unwrap();
        assert_eq!(scan_all(&engine, "t").len(), 600);
    }

    #[test]
    fn snapshot_dir_round_trip() {
        let dir = TestSnapshotDir::new();
        let snapshot = dir.open();
        let engine = snapshot.load().unwrap();
        assert_eq!(engine.version(), 0);
    }
}
