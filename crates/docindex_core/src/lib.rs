//! # docindex core
//!
//! Secondary-index engine over a transactional key-value store.
//!
//! This crate provides:
//! - Posting key codec with order-preserving value encoding
//! - Name registries interning scope and shard-key names into short codes
//! - Ancestor-diff index updates, one transaction per document
//! - Predicate to key range translation with paged scans
//! - Capped retry with incremental backoff around every transaction
//!
//! The engine is reached only through [`docindex_kv::KvEngine`]; all state
//! is namespaced so tenants never share postings, registries or sequences.
//!
//! ## Example
//!
//! ```rust
//! use docindex_core::{Condition, FieldRecord, IndexService, Query};
//! use docindex_kv::InMemoryEngine;
//!
//! let service = IndexService::new(InMemoryEngine::new());
//! service
//!     .apply_index(
//!         "acme",
//!         vec![
//!             FieldRecord::new("d1", "", "age", "31"),
//!             FieldRecord::new("d2", "", "age", "45"),
//!         ],
//!         false,
//!         false,
//!     )
//!     .unwrap();
//!
//! let condition: Condition = "age ge 40".parse().unwrap();
//! let page = service.query_keys("acme", &Query::new("", condition)).unwrap();
//! assert_eq!(page.ids, vec!["d2".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "tokio")]
mod blocking;
mod config;
pub mod cursor;
mod error;
pub mod index;
mod namespace;
mod registry;
mod retry;
mod service;
mod tables;
mod types;

#[cfg(feature = "tokio")]
pub use blocking::AsyncIndexService;
pub use config::{
    ConfigOverride, IndexConfig, ServiceConfig, ENV_DEFAULT_LIMIT, ENV_MAX_LIMIT,
    ENV_RETRY_COUNT, ENV_RETRY_WAIT_MS,
};
pub use error::{CoreError, CoreResult};
pub use index::{
    AncestorStore, ApplyMode, BatchCodes, Condition, DecodedPosting, KeyRange, Operator, Query,
    QueryPage, ShardRef,
};
pub use namespace::{
    validate_namespace, NamespaceContext, TableNames, SCOPE_SEQUENCE_KEY, SHARD_SEQUENCE_KEY,
};
pub use registry::{scope_name, validate_scope_parts, NameRegistry, SCOPE_SEPARATOR};
pub use retry::RetryPolicy;
pub use service::IndexService;
pub use tables::{list_table, RawEntry, TableEntry, TableKind, TablePage};
pub use types::{ApplyStats, Code, DocumentUpdate, FieldRecord, ShardKey};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
