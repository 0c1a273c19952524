//! Fault-injecting engine wrapper.
//!
//! [`FaultyEngine`] delegates to an inner engine but can fail commits with a
//! retryable conflict, either always, for the first N commits, or with a
//! seeded probability. Every commit attempt is counted, which lets tests
//! check retry ceilings exactly. Unlocked reads can be failed separately
//! with [`FaultyEngine::fail_reads`].

use docindex_kv::{KvEngine, KvError, KvResult, LockMode, PutOutcome, ScanPage, ScanRange};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};

/// When commits fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultMode {
    /// Never inject.
    Never,
    /// Fail every commit.
    Always,
    /// Fail the next `n` commits, then succeed.
    FirstN(usize),
    /// Fail each commit with the given probability.
    Probability(f64),
}

/// An engine whose commits can be made to conflict.
#[derive(Debug)]
pub struct FaultyEngine<E: KvEngine> {
    inner: E,
    mode: Mutex<FaultMode>,
    rng: Mutex<StdRng>,
    commit_attempts: AtomicUsize,
    injected: AtomicUsize,
    read_faults: AtomicUsize,
}

impl<E: KvEngine> FaultyEngine<E> {
    /// Wraps an engine with injection disabled.
    pub fn new(inner: E) -> Self {
        Self::with_seed(inner, 0)
    }

    /// Wraps an engine, seeding the probability source.
    pub fn with_seed(inner: E, seed: u64) -> Self {
        Self {
            inner,
            mode: Mutex::new(FaultMode::Never),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            commit_attempts: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
            read_faults: AtomicUsize::new(0),
        }
    }

    /// Sets the fault mode.
    pub fn set_mode(&self, mode: FaultMode) {
        *self.mode.lock() = mode;
    }

    /// Makes the next `n` unlocked reads fail with a retryable conflict.
    pub fn fail_reads(&self, n: usize) {
        self.read_faults.store(n, Ordering::SeqCst);
    }

    /// Returns the wrapped engine.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of commits attempted since the last reset.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Number of conflicts injected since the last reset.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Resets both counters.
    pub fn reset_counters(&self) {
        self.commit_attempts.store(0, Ordering::SeqCst);
        self.injected.store(0, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        let mut mode = self.mode.lock();
        match *mode {
            FaultMode::Never => false,
            FaultMode::Always => true,
            FaultMode::FirstN(0) => false,
            FaultMode::FirstN(n) => {
                *mode = FaultMode::FirstN(n - 1);
                true
            }
            FaultMode::Probability(p) => self.rng.lock().gen_bool(p.clamp(0.0, 1.0)),
        }
    }
}

impl<E: KvEngine> KvEngine for FaultyEngine<E> {
    type Txn = E::Txn;

    fn begin(&self) -> KvResult<Self::Txn> {
        self.inner.begin()
    }

    fn commit(&self, txn: Self::Txn) -> KvResult<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail() {
            self.injected.fetch_add(1, Ordering::SeqCst);
            self.inner.abort(txn);
            return Err(KvError::conflict("injected"));
        }
        self.inner.commit(txn)
    }

    fn abort(&self, txn: Self::Txn) {
        self.inner.abort(txn);
    }

    fn get(&self, table: &str, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        let pending = self
            .read_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(KvError::conflict(table));
        }
        self.inner.get(table, key)
    }

    fn get_in(
        &self,
        txn: &mut Self::Txn,
        table: &str,
        key: &[u8],
        lock: LockMode,
    ) -> KvResult<Option<Vec<u8>>> {
        self.inner.get_in(txn, table, key, lock)
    }

    fn put(&self, txn: &mut Self::Txn, table: &str, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.inner.put(txn, table, key, value)
    }

    fn put_if_absent(
        &self,
        txn: &mut Self::Txn,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> KvResult<PutOutcome> {
        self.inner.put_if_absent(txn, table, key, value)
    }

    fn delete(&self, txn: &mut Self::Txn, table: &str, key: &[u8]) -> KvResult<()> {
        self.inner.delete(txn, table, key)
    }

    fn scan(&self, table: &str, range: &ScanRange, limit: usize) -> KvResult<ScanPage> {
        self.inner.scan(table, range, limit)
    }

    fn sequence_next(&self, table: &str, key: &[u8], delta: i64) -> KvResult<i64> {
        self.inner.sequence_next(table, key, delta)
    }
}
