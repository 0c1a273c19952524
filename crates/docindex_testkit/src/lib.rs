//! # docindex testkit
//!
//! Test utilities for docindex.
//!
//! This crate provides:
//! - Index fixtures over the in-memory engine
//! - A fault-injecting engine wrapper for retry tests
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//!
//! Cross-crate behaviour tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use docindex_testkit::prelude::*;
//!
//! with_test_index(|index| {
//!     assert!(index.postings("acme").is_empty());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
