//! Core type definitions for docindex.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Short code interned for a composite name by a name registry.
///
/// Codes are minted from a sequence starting at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Code(pub u64);

impl Code {
    /// Creates a code.
    #[must_use]
    pub const fn new(code: u64) -> Self {
        Self(code)
    }

    /// Returns the raw code value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shard-key category and value attached to a field record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardKey {
    /// Shard-key name (category).
    pub name: String,
    /// Shard-key value. Must not be blank.
    pub value: String,
}

impl ShardKey {
    /// Creates a shard key.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One indexable field of one document.
///
/// A record contributes an unsharded posting when `value` is non-empty and
/// one sharded posting per entry of `shard_keys`. A record with an empty
/// value and no shard keys contributes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Document the field belongs to.
    pub document_id: String,
    /// Hierarchical parent path of the field.
    #[serde(default)]
    pub parent_path: String,
    /// Field name. May be blank only when shard keys are given.
    #[serde(default)]
    pub field_name: String,
    /// Field value.
    #[serde(default)]
    pub value: String,
    /// Optional shard keys.
    #[serde(default)]
    pub shard_keys: Vec<ShardKey>,
}

impl FieldRecord {
    /// Creates a record without shard keys.
    pub fn new(
        document_id: impl Into<String>,
        parent_path: impl Into<String>,
        field_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            parent_path: parent_path.into(),
            field_name: field_name.into(),
            value: value.into(),
            shard_keys: Vec::new(),
        }
    }

    /// Adds a shard key.
    #[must_use]
    pub fn with_shard(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.shard_keys.push(ShardKey::new(name, value));
        self
    }

    /// Returns true if the record contributes no posting at all.
    #[must_use]
    pub fn is_empty_contribution(&self) -> bool {
        self.value.is_empty() && self.shard_keys.is_empty()
    }
}

/// All field records of one document in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    /// Document being updated.
    pub document_id: String,
    /// Field records of the document.
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
}

impl DocumentUpdate {
    /// Creates an update with no fields (a full delete, or an update that
    /// clears every posting).
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field record for this document.
    #[must_use]
    pub fn field(
        mut self,
        parent_path: impl Into<String>,
        field_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let record = FieldRecord::new(self.document_id.clone(), parent_path, field_name, value);
        self.fields.push(record);
        self
    }

    /// Adds a prepared record.
    #[must_use]
    pub fn record(mut self, record: FieldRecord) -> Self {
        self.fields.push(record);
        self
    }

    /// Groups flat records by document id, preserving first-seen order.
    #[must_use]
    pub fn group(records: Vec<FieldRecord>) -> Vec<DocumentUpdate> {
        let mut updates: Vec<DocumentUpdate> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        for record in records {
            match slots.get(&record.document_id) {
                Some(&slot) => updates[slot].fields.push(record),
                None => {
                    slots.insert(record.document_id.clone(), updates.len());
                    updates.push(DocumentUpdate {
                        document_id: record.document_id.clone(),
                        fields: vec![record],
                    });
                }
            }
        }
        updates
    }
}

/// Counters describing what one `apply` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    /// Documents processed.
    pub documents: usize,
    /// Postings written.
    pub postings_added: usize,
    /// Postings deleted.
    pub postings_removed: usize,
    /// Ancestor records (re)written.
    pub ancestors_written: usize,
    /// Ancestor records deleted.
    pub ancestors_deleted: usize,
}

impl ApplyStats {
    /// Returns true if the call changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.postings_added == 0
            && self.postings_removed == 0
            && self.ancestors_written == 0
            && self.ancestors_deleted == 0
    }

    pub(crate) fn merge(&mut self, other: ApplyStats) {
        self.documents += other.documents;
        self.postings_added += other.postings_added;
        self.postings_removed += other.postings_removed;
        self.ancestors_written += other.ancestors_written;
        self.ancestors_deleted += other.ancestors_deleted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_display() {
        assert_eq!(format!("{}", Code::new(42)), "#42");
    }

    #[test]
    fn group_preserves_order() {
        let records = vec![
            FieldRecord::new("d2", "", "a", "1"),
            FieldRecord::new("d1", "", "a", "2"),
            FieldRecord::new("d2", "", "b", "3"),
        ];
        let updates = DocumentUpdate::group(records);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].document_id, "d2");
        assert_eq!(updates[0].fields.len(), 2);
        assert_eq!(updates[1].document_id, "d1");
    }

    #[test]
    fn group_large_interleaved_batch() {
        let records: Vec<FieldRecord> = (0..3000)
            .map(|i| FieldRecord::new(format!("d{}", i % 1000), "", format!("f{i}"), "v"))
            .collect();
        let updates = DocumentUpdate::group(records);
        assert_eq!(updates.len(), 1000);
        assert_eq!(updates[0].document_id, "d0");
        assert_eq!(updates[999].document_id, "d999");
        assert!(updates.iter().all(|u| u.fields.len() == 3));
        assert_eq!(updates[7].fields[2].field_name, "f2007");
    }

    #[test]
    fn empty_contribution() {
        assert!(FieldRecord::new("d", "", "a", "").is_empty_contribution());
        assert!(!FieldRecord::new("d", "", "a", "").with_shard("region", "eu").is_empty_contribution());
    }

    #[test]
    fn record_deserializes_with_defaults() {
        let record: FieldRecord =
            serde_json::from_str(r#"{"document_id":"d1","field_name":"name","value":"alice"}"#)
                .unwrap();
        assert_eq!(record.parent_path, "");
        assert!(record.shard_keys.is_empty());
    }
}
