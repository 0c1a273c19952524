//! # docindex KV
//!
//! Transactional key-value engine abstraction for docindex.
//!
//! This crate provides the lowest-level storage contract the index engine
//! talks to. Engines are **opaque byte stores** organised in named tables:
//! they do not interpret posting keys, ancestor records or registry codes.
//!
//! ## Design Principles
//!
//! - Engines offer transactions, ordered scans and named sequences
//! - Errors classify themselves as retryable or input errors
//! - Must be `Send + Sync` for concurrent access
//! - docindex owns all key and value format interpretation
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - optimistic-concurrency engine, persisted through
//!   [`SnapshotDir`]
//!
//! ## Example
//!
//! ```rust
//! use docindex_kv::{InMemoryEngine, KvEngine, ScanRange};
//!
//! let engine = InMemoryEngine::new();
//! let mut txn = engine.begin().unwrap();
//! engine.put(&mut txn, "t", b"a", b"1").unwrap();
//! engine.put(&mut txn, "t", b"b", b"2").unwrap();
//! engine.commit(txn).unwrap();
//!
//! let page = engine.scan("t", &ScanRange::all(), 10).unwrap();
//! assert_eq!(page.items.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;
mod snapshot;

pub use engine::{prefix_successor, KvEngine, LockMode, PutOutcome, ScanPage, ScanRange};
pub use error::{KvError, KvResult};
pub use memory::{InMemoryEngine, MemoryTransaction};
pub use snapshot::SnapshotDir;
