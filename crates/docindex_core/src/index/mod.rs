//! Index maintenance and query.
//!
//! - [`codec`] - posting key and ancestor record encoding
//! - [`ancestor`] - per-document live posting sets
//! - [`update`] - ancestor-diff update protocol
//! - [`query`] - predicate to key range translation and scans

pub mod ancestor;
pub mod codec;
pub mod query;
pub mod update;

pub use ancestor::AncestorStore;
pub use codec::{
    decode_posting, decode_scope, encode_posting, DecodedPosting, ShardRef, EXCLUSIVE_UPPER,
    FORWARD_MATCH,
};
pub use query::{build_range, key_range, Condition, KeyRange, Operator, Query, QueryPage};
pub use update::{apply, ApplyMode, BatchCodes};
