//! Engine trait definition and scan types.

use crate::error::KvResult;

/// How a transactional read participates in conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Read the latest committed value without registering the read.
    ReadCommitted,
    /// Register the read so that a concurrent change to the key makes the
    /// enclosing transaction fail to commit.
    #[default]
    ReadModifyWrite,
}

/// Outcome of [`KvEngine::put_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The key was absent and the value has been staged.
    Inserted,
    /// The key already holds a value; nothing was staged.
    KeyExists,
}

/// Bounds of an ordered scan.
///
/// `None` bounds are open. When `cursor` is set the scan resumes strictly
/// after that key, whatever `start` says.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRange {
    /// Lower bound.
    pub start: Option<Vec<u8>>,
    /// Upper bound.
    pub end: Option<Vec<u8>>,
    /// Whether `start` itself is excluded.
    pub exclude_start: bool,
    /// Whether `end` itself is excluded.
    pub exclude_end: bool,
    /// Last key returned by a previous page.
    pub cursor: Option<Vec<u8>>,
}

impl ScanRange {
    /// A range covering the whole table.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A range covering every key that starts with `prefix`.
    #[must_use]
    pub fn prefix(prefix: &[u8]) -> Self {
        if prefix.is_empty() {
            return Self::all();
        }
        let end = prefix_successor(prefix);
        Self {
            start: Some(prefix.to_vec()),
            exclude_end: end.is_some(),
            end,
            ..Self::default()
        }
    }

    /// Sets the continuation cursor.
    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<Vec<u8>>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Returns true if `key` lies inside the range (cursor ignored).
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let above = match &self.start {
            Some(start) if self.exclude_start => key > start.as_slice(),
            Some(start) => key >= start.as_slice(),
            None => true,
        };
        let below = match &self.end {
            Some(end) if self.exclude_end => key < end.as_slice(),
            Some(end) => key <= end.as_slice(),
            None => true,
        };
        above && below
    }
}

/// The smallest key greater than every key having `prefix` as a prefix.
///
/// Returns `None` when no such key exists (the prefix is all `0xFF`).
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last < u8::MAX {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}

/// One page of scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Key/value pairs in ascending key order.
    pub items: Vec<(Vec<u8>, Vec<u8>)>,
    /// Set when the page was cut short by the limit and more items remain.
    pub next_cursor: Option<Vec<u8>>,
}

/// An embedded transactional key-value engine.
///
/// Engines expose named tables of ordered byte keys, optimistic
/// transactions, ordered range scans and named sequences. The engine does
/// not interpret keys or values.
///
/// # Invariants
///
/// - Writes staged on a transaction are invisible to others until `commit`
/// - `commit` fails with a retryable error if a key the transaction read with
///   [`LockMode::ReadModifyWrite`] or wrote was changed by someone else
/// - `scan` returns keys in ascending byte order
/// - `sequence_next` never returns the same value twice for one key
///
/// # Implementors
///
/// - [`super::InMemoryEngine`] - reference engine with snapshot persistence
pub trait KvEngine: Send + Sync {
    /// Transaction handle type.
    type Txn: Send;

    /// Opens a transaction.
    fn begin(&self) -> KvResult<Self::Txn>;

    /// Commits a transaction, applying all staged writes atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KvError::Conflict`] if validation fails.
    fn commit(&self, txn: Self::Txn) -> KvResult<()>;

    /// Discards a transaction and its staged writes.
    fn abort(&self, txn: Self::Txn);

    /// Reads the latest committed value outside any transaction.
    fn get(&self, table: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Reads a value inside a transaction, seeing its own staged writes.
    fn get_in(
        &self,
        txn: &mut Self::Txn,
        table: &str,
        key: &[u8],
        lock: LockMode,
    ) -> KvResult<Option<Vec<u8>>>;

    /// Stages a write.
    fn put(&self, txn: &mut Self::Txn, table: &str, key: &[u8], value: &[u8]) -> KvResult<()>;

    /// Stages a write only if the key currently has no value.
    fn put_if_absent(
        &self,
        txn: &mut Self::Txn,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> KvResult<PutOutcome>;

    /// Stages a delete. Deleting a missing key is not an error.
    fn delete(&self, txn: &mut Self::Txn, table: &str, key: &[u8]) -> KvResult<()>;

    /// Scans committed data in key order, returning at most `limit` items.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KvError::InvalidInput`] if `limit` is zero.
    fn scan(&self, table: &str, range: &ScanRange, limit: usize) -> KvResult<ScanPage>;

    /// Returns the current value of the named sequence and advances it by
    /// `delta`. A fresh sequence starts at `0`.
    fn sequence_next(&self, table: &str, key: &[u8], delta: i64) -> KvResult<i64>;
}
