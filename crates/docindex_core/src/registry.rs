//! Name registry: interns composite names into short codes.
//!
//! Each registry owns one table (`name -> 8-byte big-endian code`) and one
//! key in the namespace's sequence table. Entries are write-once, so codes
//! are cached in memory without invalidation.
//!
//! Resolution of a missing name:
//!
//! 1. mint a code from the sequence, skipping its initial `0`
//! 2. insert-if-absent inside a transaction and commit
//! 3. on `KeyExists` or a commit conflict, abort and re-read; the winner's
//!    code is returned and the minted one is discarded
//!
//! A name still missing after the retry budget is reported as
//! [`CoreError::RetryExceeded`].

use crate::error::{CoreError, CoreResult};
use crate::index::codec::{decode_code_value, encode_code_value};
use crate::retry::RetryPolicy;
use crate::types::Code;
use docindex_kv::{KvEngine, KvError, PutOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Separator between parent path and field name in scope names.
pub const SCOPE_SEPARATOR: char = '\u{1F}';

/// Rejects scope parts that contain [`SCOPE_SEPARATOR`].
///
/// With the separator excluded, distinct `(parent_path, field_name)` pairs
/// always yield distinct scope names.
pub fn validate_scope_parts(parent_path: &str, field_name: &str) -> CoreResult<()> {
    for (what, part) in [("parent path", parent_path), ("field name", field_name)] {
        if part.contains(SCOPE_SEPARATOR) {
            return Err(CoreError::validation(format!(
                "{what} {part:?} contains the reserved separator U+001F"
            )));
        }
    }
    Ok(())
}

/// Builds the composite name of a scope.
///
/// Callers validate both parts with [`validate_scope_parts`] first.
#[must_use]
pub fn scope_name(parent_path: &str, field_name: &str) -> String {
    let mut name = String::with_capacity(parent_path.len() + field_name.len() + 1);
    name.push_str(parent_path);
    name.push(SCOPE_SEPARATOR);
    name.push_str(field_name);
    name
}

/// A write-once mapping from names to codes.
#[derive(Debug)]
pub struct NameRegistry {
    table: String,
    sequence_table: String,
    sequence_key: Vec<u8>,
    retry: RetryPolicy,
    cache: RwLock<HashMap<String, Code>>,
}

impl NameRegistry {
    /// Creates a registry over `table`, minting from `sequence_key` in
    /// `sequence_table`.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        sequence_table: impl Into<String>,
        sequence_key: &[u8],
        retry: RetryPolicy,
    ) -> Self {
        Self {
            table: table.into(),
            sequence_table: sequence_table.into(),
            sequence_key: sequence_key.to_vec(),
            retry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the registry table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the number of cached names.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Looks a name up without creating it.
    pub fn lookup<E: KvEngine>(&self, engine: &E, name: &str) -> CoreResult<Option<Code>> {
        if let Some(code) = self.cache.read().get(name) {
            return Ok(Some(*code));
        }
        let code = self.read_stored(engine, name)?;
        if let Some(code) = code {
            self.remember(name, code);
        }
        Ok(code)
    }

    /// Returns the code of `name`, registering it on first use.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RetryExceeded`] if the name could neither be inserted
    ///   nor read back within the retry budget
    /// - [`CoreError::Validation`] for engine input errors
    /// - any other engine error, unchanged
    pub fn resolve_or_create<E: KvEngine>(&self, engine: &E, name: &str) -> CoreResult<Code> {
        if let Some(code) = self.cache.read().get(name) {
            return Ok(*code);
        }
        // The stored read happens inside `register_once`, under the policy.
        let result = self
            .retry
            .run("register_name", |_| self.register_once(engine, name));
        match result {
            Ok(code) => {
                self.remember(name, code);
                Ok(code)
            }
            Err(CoreError::Io { attempts, .. }) => Err(CoreError::RetryExceeded {
                name: name.to_string(),
                attempts,
            }),
            Err(err) => Err(err),
        }
    }

    fn register_once<E: KvEngine>(&self, engine: &E, name: &str) -> CoreResult<Code> {
        if let Some(code) = self.read_stored(engine, name)? {
            return Ok(code);
        }
        let minted = self.mint(engine)?;

        let mut txn = engine.begin()?;
        let outcome = match engine.put_if_absent(
            &mut txn,
            &self.table,
            name.as_bytes(),
            &encode_code_value(minted),
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                engine.abort(txn);
                return Err(err.into());
            }
        };
        match outcome {
            PutOutcome::Inserted => match engine.commit(txn) {
                Ok(()) => {
                    debug!(table = %self.table, name, code = minted.as_u64(), "registered name");
                    return Ok(minted);
                }
                Err(err) if err.is_retryable() => {}
                Err(err) => return Err(err.into()),
            },
            PutOutcome::KeyExists => engine.abort(txn),
        }

        // Lost the race; the winner's code must now be visible.
        match self.read_stored(engine, name)? {
            Some(code) => Ok(code),
            None => Err(KvError::conflict(self.table.as_str()).into()),
        }
    }

    fn mint<E: KvEngine>(&self, engine: &E) -> CoreResult<Code> {
        loop {
            let value = engine.sequence_next(&self.sequence_table, &self.sequence_key, 1)?;
            if value == 0 {
                continue;
            }
            let raw = u64::try_from(value).map_err(|_| {
                CoreError::invalid_format(format!(
                    "sequence {} yielded negative value {value}",
                    self.sequence_table
                ))
            })?;
            return Ok(Code::new(raw));
        }
    }

    fn read_stored<E: KvEngine>(&self, engine: &E, name: &str) -> CoreResult<Option<Code>> {
        engine
            .get(&self.table, name.as_bytes())?
            .map(|bytes| decode_code_value(&bytes))
            .transpose()
    }

    fn remember(&self, name: &str, code: Code) {
        self.cache.write().insert(name.to_string(), code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_kv::InMemoryEngine;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> NameRegistry {
        NameRegistry::new(
            "ns.scope",
            "ns.sequence",
            b"scope",
            RetryPolicy::new(3, Duration::ZERO),
        )
    }

    #[test]
    fn codes_start_at_one_and_are_stable() {
        let engine = InMemoryEngine::new();
        let reg = registry();
        let a = reg.resolve_or_create(&engine, "a").unwrap();
        let b = reg.resolve_or_create(&engine, "b").unwrap();
        assert_eq!(a, Code::new(1));
        assert_eq!(b, Code::new(2));
        assert_eq!(reg.resolve_or_create(&engine, "a").unwrap(), a);
    }

    #[test]
    fn lookup_does_not_create() {
        let engine = InMemoryEngine::new();
        let reg = registry();
        assert_eq!(reg.lookup(&engine, "missing").unwrap(), None);
        assert_eq!(engine.table_len("ns.scope"), 0);
    }

    #[test]
    fn fresh_registry_reads_persisted_codes() {
        let engine = InMemoryEngine::new();
        let code = registry().resolve_or_create(&engine, "name").unwrap();

        let other = registry();
        assert_eq!(other.cached_len(), 0);
        assert_eq!(other.lookup(&engine, "name").unwrap(), Some(code));
        assert_eq!(other.cached_len(), 1);
    }

    #[test]
    fn registries_do_not_share_codes_by_name() {
        let engine = InMemoryEngine::new();
        let scopes = registry();
        let shards = NameRegistry::new("ns.shard", "ns.sequence", b"shard", RetryPolicy::no_retry());
        assert_eq!(scopes.resolve_or_create(&engine, "x").unwrap(), Code::new(1));
        assert_eq!(shards.resolve_or_create(&engine, "x").unwrap(), Code::new(1));
        assert_eq!(shards.resolve_or_create(&engine, "y").unwrap(), Code::new(2));
    }

    #[test]
    fn concurrent_first_use_agrees() {
        let engine = Arc::new(InMemoryEngine::new());
        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.resolve_or_create(engine.as_ref(), "shared").unwrap())
            })
            .collect();
        let codes: Vec<Code> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(codes.iter().all(|c| *c == codes[0]));
        assert_eq!(engine.table_len("ns.scope"), 1);
    }

    #[test]
    fn scope_names_are_unambiguous() {
        assert_ne!(scope_name("a", "bc"), scope_name("ab", "c"));
        assert_eq!(scope_name("", "name"), "\u{1F}name");
    }

    #[test]
    fn separator_inside_scope_parts_rejected() {
        assert!(validate_scope_parts("a\u{1F}b", "c").unwrap_err().is_validation());
        assert!(validate_scope_parts("a", "b\u{1F}c").unwrap_err().is_validation());
        assert!(validate_scope_parts("a.b", "c d").is_ok());
        // The two pairs above would otherwise share one name.
        assert_eq!(scope_name("a\u{1F}b", "c"), scope_name("a", "b\u{1F}c"));
    }
}
