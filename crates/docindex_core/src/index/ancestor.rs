//! Ancestor store: per-document list of live posting keys.
//!
//! Only used inside an index update transaction. Reads register the record
//! for conflict detection so that two concurrent updates of one document
//! cannot both commit.

use crate::error::CoreResult;
use crate::index::codec::{decode_ancestor, encode_ancestor};
use docindex_kv::{KvEngine, LockMode};

/// Ancestor table accessor bound to one engine and table.
#[derive(Debug)]
pub struct AncestorStore<'a, E: KvEngine> {
    engine: &'a E,
    table: &'a str,
}

impl<'a, E: KvEngine> AncestorStore<'a, E> {
    /// Creates an accessor.
    pub fn new(engine: &'a E, table: &'a str) -> Self {
        Self { engine, table }
    }

    /// Reads the live posting keys of a document.
    pub fn read(&self, txn: &mut E::Txn, document_id: &str) -> CoreResult<Option<Vec<Vec<u8>>>> {
        self.engine
            .get_in(txn, self.table, document_id.as_bytes(), LockMode::ReadModifyWrite)?
            .map(|bytes| decode_ancestor(&bytes))
            .transpose()
    }

    /// Replaces the record of a document.
    pub fn write(&self, txn: &mut E::Txn, document_id: &str, postings: &[Vec<u8>]) -> CoreResult<()> {
        self.engine.put(
            txn,
            self.table,
            document_id.as_bytes(),
            &encode_ancestor(postings),
        )?;
        Ok(())
    }

    /// Removes the record of a document.
    pub fn delete(&self, txn: &mut E::Txn, document_id: &str) -> CoreResult<()> {
        self.engine.delete(txn, self.table, document_id.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docindex_kv::InMemoryEngine;

    #[test]
    fn write_read_delete() {
        let engine = InMemoryEngine::new();
        let store = AncestorStore::new(&engine, "ns.ancestor");
        let keys = vec![b"k1".to_vec(), b"k2".to_vec()];

        let mut txn = engine.begin().unwrap();
        assert_eq!(store.read(&mut txn, "d1").unwrap(), None);
        store.write(&mut txn, "d1", &keys).unwrap();
        assert_eq!(store.read(&mut txn, "d1").unwrap(), Some(keys.clone()));
        engine.commit(txn).unwrap();

        let mut txn = engine.begin().unwrap();
        assert_eq!(store.read(&mut txn, "d1").unwrap(), Some(keys));
        store.delete(&mut txn, "d1").unwrap();
        engine.commit(txn).unwrap();

        assert_eq!(engine.get("ns.ancestor", b"d1").unwrap(), None);
    }

    #[test]
    fn concurrent_updates_conflict() {
        let engine = InMemoryEngine::new();
        let store = AncestorStore::new(&engine, "ns.ancestor");

        let mut first = engine.begin().unwrap();
        let mut second = engine.begin().unwrap();
        store.read(&mut first, "d1").unwrap();
        store.read(&mut second, "d1").unwrap();
        store.write(&mut first, "d1", &[b"a".to_vec()]).unwrap();
        store.write(&mut second, "d1", &[b"b".to_vec()]).unwrap();

        engine.commit(first).unwrap();
        assert!(engine.commit(second).unwrap_err().is_retryable());
    }

    #[test]
    fn corrupt_record_is_format_error() {
        let engine = InMemoryEngine::new();
        let mut txn = engine.begin().unwrap();
        engine.put(&mut txn, "ns.ancestor", b"d1", &[0, 0, 0, 9]).unwrap();
        engine.commit(txn).unwrap();

        let store = AncestorStore::new(&engine, "ns.ancestor");
        let mut txn = engine.begin().unwrap();
        assert!(matches!(
            store.read(&mut txn, "d1"),
            Err(crate::error::CoreError::InvalidFormat { .. })
        ));
    }
}
