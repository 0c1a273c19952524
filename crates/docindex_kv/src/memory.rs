//! In-memory transactional engine.

use crate::engine::{KvEngine, LockMode, PutOutcome, ScanPage, ScanRange};
use crate::error::{KvError, KvResult};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A stored key slot. A deleted key keeps its slot (a tombstone) while an
/// open transaction could still need its version for conflict detection.
#[derive(Debug, Clone)]
struct Slot {
    value: Option<Vec<u8>>,
    version: u64,
}

type Table = BTreeMap<Vec<u8>, Slot>;

/// Committed engine state.
#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Table>,
    /// Version stamped on the most recent committed change.
    version: u64,
    /// Tombstones in the order they were written.
    tombstones: VecDeque<(u64, String, Vec<u8>)>,
}

impl State {
    fn slot(&self, table: &str, key: &[u8]) -> Option<&Slot> {
        self.tables.get(table).and_then(|t| t.get(key))
    }

    fn version_of(&self, table: &str, key: &[u8]) -> u64 {
        self.slot(table, key).map_or(0, |s| s.version)
    }

    fn value_of(&self, table: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.slot(table, key).and_then(|s| s.value.clone())
    }

    fn write(&mut self, table: &str, key: Vec<u8>, value: Option<Vec<u8>>) {
        self.version += 1;
        let version = self.version;
        if value.is_none() {
            self.tombstones
                .push_back((version, table.to_string(), key.clone()));
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key, Slot { value, version });
    }

    /// Drops tombstones written at or before `horizon`.
    ///
    /// A transaction started at version `v` only compares write versions
    /// against `v`, so tombstones at or below the oldest open start version
    /// can no longer cause a conflict.
    fn purge_tombstones(&mut self, horizon: u64) {
        while let Some((version, _, _)) = self.tombstones.front() {
            if *version > horizon {
                break;
            }
            let Some((version, table, key)) = self.tombstones.pop_front() else {
                break;
            };
            let Some(rows) = self.tables.get_mut(&table) else {
                continue;
            };
            // Rewritten keys carry a newer version and are left alone.
            if rows
                .get(&key)
                .is_some_and(|slot| slot.value.is_none() && slot.version == version)
            {
                rows.remove(&key);
                if rows.is_empty() {
                    self.tables.remove(&table);
                }
            }
        }
    }
}

/// Start versions of open transactions, by transaction id.
type ActiveTxns = Arc<Mutex<HashMap<u64, u64>>>;

/// Version a transaction observed for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    version: u64,
    live: bool,
}

/// A transaction on an [`InMemoryEngine`].
///
/// Reads register the version they observed; writes are buffered until
/// commit. The transaction is consumed by `commit` or `abort`.
#[derive(Debug)]
pub struct MemoryTransaction {
    id: u64,
    /// Committed version at the time the transaction started.
    start_version: u64,
    /// Read set: (table, key) -> observed version.
    reads: HashMap<(String, Vec<u8>), Observed>,
    /// Staged writes: (table, key) -> new value (None = delete).
    writes: BTreeMap<(String, Vec<u8>), Option<Vec<u8>>>,
    active: ActiveTxns,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}

impl MemoryTransaction {
    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    fn staged(&self, table: &str, key: &[u8]) -> Option<&Option<Vec<u8>>> {
        self.writes.get(&(table.to_string(), key.to_vec()))
    }
}

/// An in-memory engine with optimistic concurrency control.
///
/// This engine is suitable for:
/// - Unit and integration tests
/// - Single-process deployments that persist through snapshots
///   (see [`crate::SnapshotDir`])
///
/// # Isolation
///
/// Transactions are validated at commit: every key read with
/// [`LockMode::ReadModifyWrite`] must still carry the version it had when it
/// was read, and every written key must not have been changed since the
/// transaction began. Otherwise commit fails with [`KvError::Conflict`].
///
/// Deleted keys leave tombstones behind; each commit purges those older
/// than every open transaction.
///
/// # Example
///
/// ```rust
/// use docindex_kv::{InMemoryEngine, KvEngine};
///
/// let engine = InMemoryEngine::new();
/// let mut txn = engine.begin().unwrap();
/// engine.put(&mut txn, "users", b"alice", b"1").unwrap();
/// engine.commit(txn).unwrap();
/// assert_eq!(engine.get("users", b"alice").unwrap(), Some(b"1".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RwLock<State>,
    next_txid: AtomicU64,
    active: ActiveTxns,
}

impl InMemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine preloaded with live key/value pairs per table.
    #[must_use]
    pub fn with_tables(tables: BTreeMap<String, Vec<(Vec<u8>, Vec<u8>)>>) -> Self {
        let mut state = State::default();
        for (name, items) in tables {
            for (key, value) in items {
                state.write(&name, key, Some(value));
            }
        }
        Self {
            state: RwLock::new(state),
            ..Self::default()
        }
    }

    /// Returns all live key/value pairs per table.
    ///
    /// Used by the snapshot layer and for debugging.
    #[must_use]
    pub fn export_tables(&self) -> BTreeMap<String, Vec<(Vec<u8>, Vec<u8>)>> {
        let state = self.state.read();
        let mut out = BTreeMap::new();
        for (name, table) in &state.tables {
            let items: Vec<_> = table
                .iter()
                .filter_map(|(k, s)| s.value.as_ref().map(|v| (k.clone(), v.clone())))
                .collect();
            if !items.is_empty() {
                out.insert(name.clone(), items);
            }
        }
        out
    }

    /// Returns the names of tables holding at least one live key.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.export_tables().into_keys().collect();
        names.sort();
        names
    }

    /// Returns the number of live keys in a table.
    #[must_use]
    pub fn table_len(&self, table: &str) -> usize {
        self.state
            .read()
            .tables
            .get(table)
            .map_or(0, |t| t.values().filter(|s| s.value.is_some()).count())
    }

    /// Returns the number of stored slots in a table, tombstones included.
    #[must_use]
    pub fn stored_len(&self, table: &str) -> usize {
        self.state.read().tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Returns the committed version counter.
    ///
    /// Every committed change bumps it, so two equal readings mean nothing
    /// was written in between.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

impl KvEngine for InMemoryEngine {
    type Txn = MemoryTransaction;

    fn begin(&self) -> KvResult<MemoryTransaction> {
        let id = self.next_txid.fetch_add(1, Ordering::SeqCst) + 1;
        // Lock order: state, then the active set.
        let state = self.state.read();
        let start_version = state.version;
        self.active.lock().insert(id, start_version);
        Ok(MemoryTransaction {
            id,
            start_version,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
            active: Arc::clone(&self.active),
        })
    }

    fn commit(&self, txn: MemoryTransaction) -> KvResult<()> {
        let mut state = self.state.write();

        for ((table, key), observed) in &txn.reads {
            let unchanged = match state.slot(table, key) {
                Some(slot) => slot.version == observed.version,
                // Purged tombstone: the key is still absent.
                None => !observed.live,
            };
            if !unchanged {
                return Err(KvError::conflict(table.as_str()));
            }
        }
        for (table, key) in txn.writes.keys() {
            if state.version_of(table, key) > txn.start_version
                && !txn.reads.contains_key(&(table.clone(), key.clone()))
            {
                return Err(KvError::conflict(table.as_str()));
            }
        }

        for ((table, key), value) in &txn.writes {
            state.write(table, key.clone(), value.clone());
        }

        let horizon = {
            let mut active = self.active.lock();
            active.remove(&txn.id);
            active.values().copied().min().unwrap_or(state.version)
        };
        state.purge_tombstones(horizon);
        Ok(())
    }

    fn abort(&self, txn: MemoryTransaction) {
        drop(txn);
    }

    fn get(&self, table: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        Ok(self.state.read().value_of(table, key))
    }

    fn get_in(
        &self,
        txn: &mut MemoryTransaction,
        table: &str,
        key: &[u8],
        lock: LockMode,
    ) -> KvResult<Option<Vec<u8>>> {
        if let Some(staged) = txn.staged(table, key) {
            return Ok(staged.clone());
        }
        let state = self.state.read();
        if lock == LockMode::ReadModifyWrite {
            txn.reads
                .entry((table.to_string(), key.to_vec()))
                .or_insert_with(|| {
                    let slot = state.slot(table, key);
                    Observed {
                        version: slot.map_or(0, |s| s.version),
                        live: slot.is_some_and(|s| s.value.is_some()),
                    }
                });
        }
        Ok(state.value_of(table, key))
    }

    fn put(&self, txn: &mut MemoryTransaction, table: &str, key: &[u8], value: &[u8]) -> KvResult<()> {
        txn.writes
            .insert((table.to_string(), key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn put_if_absent(
        &self,
        txn: &mut MemoryTransaction,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> KvResult<PutOutcome> {
        if self
            .get_in(txn, table, key, LockMode::ReadModifyWrite)?
            .is_some()
        {
            return Ok(PutOutcome::KeyExists);
        }
        self.put(txn, table, key, value)?;
        Ok(PutOutcome::Inserted)
    }

    fn delete(&self, txn: &mut MemoryTransaction, table: &str, key: &[u8]) -> KvResult<()> {
        txn.writes.insert((table.to_string(), key.to_vec()), None);
        Ok(())
    }

    fn scan(&self, table: &str, range: &ScanRange, limit: usize) -> KvResult<ScanPage> {
        if limit == 0 {
            return Err(KvError::invalid_input("scan limit must be positive"));
        }

        let state = self.state.read();
        let Some(rows) = state.tables.get(table) else {
            return Ok(ScanPage::default());
        };

        let lower = match (&range.cursor, &range.start) {
            (Some(cursor), _) => Bound::Excluded(cursor.clone()),
            (None, Some(start)) if range.exclude_start => Bound::Excluded(start.clone()),
            (None, Some(start)) => Bound::Included(start.clone()),
            (None, None) => Bound::Unbounded,
        };
        // A cursor may sit below an exclusive start; `contains` re-checks it.
        let mut items = Vec::new();
        let mut truncated = false;
        for (key, slot) in rows.range((lower, Bound::Unbounded)) {
            if !range.contains(key) {
                let past_end = match &range.end {
                    Some(end) if range.exclude_end => key.as_slice() >= end.as_slice(),
                    Some(end) => key.as_slice() > end.as_slice(),
                    None => false,
                };
                if past_end {
                    break;
                }
                continue;
            }
            let Some(value) = &slot.value else { continue };
            if items.len() == limit {
                truncated = true;
                break;
            }
            items.push((key.clone(), value.clone()));
        }

        let next_cursor = if truncated {
            items.last().map(|(k, _)| k.clone())
        } else {
            None
        };
        Ok(ScanPage { items, next_cursor })
    }

    fn sequence_next(&self, table: &str, key: &[u8], delta: i64) -> KvResult<i64> {
        if delta <= 0 {
            return Err(KvError::invalid_input("sequence delta must be positive"));
        }
        let mut state = self.state.write();
        let current = match state.value_of(table, key) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    KvError::Corrupted(format!(
                        "sequence value in {table} has {} bytes, expected 8",
                        bytes.len()
                    ))
                })?;
                i64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| KvError::Corrupted(format!("sequence in {table} overflowed")))?;
        state.write(table, key.to_vec(), Some(next.to_be_bytes().to_vec()));
        Ok(current)
    }
}
