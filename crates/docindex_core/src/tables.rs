//! Raw browsing of a namespace's tables.
//!
//! Each [`TableKind`] knows how to render its own keys and values, so a
//! listing decodes every row with the decoder picked once per call.

use crate::cursor;
use crate::error::{CoreError, CoreResult};
use crate::index::codec::{decode_ancestor, decode_code_value, decode_posting, DecodedPosting};
use crate::namespace::NamespaceContext;
use crate::registry::SCOPE_SEPARATOR;
use crate::types::Code;
use docindex_kv::{KvEngine, ScanRange};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The tables of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Postings.
    Index,
    /// Ancestor records.
    Ancestor,
    /// Scope registry.
    Scope,
    /// Shard-key registry.
    Shard,
    /// Registry sequences.
    Sequence,
}

impl TableKind {
    /// Every table kind.
    pub const ALL: [TableKind; 5] = [
        TableKind::Index,
        TableKind::Ancestor,
        TableKind::Scope,
        TableKind::Shard,
        TableKind::Sequence,
    ];

    /// Returns the table's short name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TableKind::Index => "index",
            TableKind::Ancestor => "ancestor",
            TableKind::Scope => "scope",
            TableKind::Shard => "shard",
            TableKind::Sequence => "sequence",
        }
    }

    /// Decodes one row of this table.
    pub fn decode(self, key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
        match self {
            TableKind::Index => decode_index_row(key, value),
            TableKind::Ancestor => decode_ancestor_row(key, value),
            TableKind::Scope => decode_scope_row(key, value),
            TableKind::Shard => decode_shard_row(key, value),
            TableKind::Sequence => decode_sequence_row(key, value),
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::validation(format!("unknown table {s:?}")))
    }
}

/// A decoded table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableEntry {
    /// A posting and the document it points at.
    Posting {
        /// Posting key components.
        posting: DecodedPosting,
        /// Stored document id.
        document_id: String,
    },
    /// A document's live posting keys.
    Ancestor {
        /// Document id.
        document_id: String,
        /// Decoded postings, in stored order.
        postings: Vec<DecodedPosting>,
    },
    /// A scope registry entry.
    Scope {
        /// Parent path.
        parent_path: String,
        /// Field name.
        field_name: String,
        /// Assigned code.
        code: Code,
    },
    /// A shard-key registry entry.
    Shard {
        /// Shard-key name.
        name: String,
        /// Assigned code.
        code: Code,
    },
    /// A sequence counter.
    Sequence {
        /// Sequence key.
        key: String,
        /// Value the next mint will return.
        next: i64,
    },
}

impl fmt::Display for TableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableEntry::Posting {
                posting,
                document_id,
            } => {
                write!(f, "scope={} value={:?}", posting.scope, posting.value)?;
                if let Some((code, value)) = &posting.shard {
                    write!(f, " shard={code}:{value:?}")?;
                }
                write!(f, " -> {document_id}")
            }
            TableEntry::Ancestor {
                document_id,
                postings,
            } => write!(f, "{document_id}: {} postings", postings.len()),
            TableEntry::Scope {
                parent_path,
                field_name,
                code,
            } => write!(f, "{parent_path:?}/{field_name:?} = {code}"),
            TableEntry::Shard { name, code } => write!(f, "{name:?} = {code}"),
            TableEntry::Sequence { key, next } => write!(f, "{key} next={next}"),
        }
    }
}

fn utf8(bytes: &[u8], what: &str) -> CoreResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CoreError::invalid_format(format!("{what} is not UTF-8")))
}

fn decode_index_row(key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
    Ok(TableEntry::Posting {
        posting: decode_posting(key)?,
        document_id: utf8(value, "posting document id")?,
    })
}

fn decode_ancestor_row(key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
    let postings = decode_ancestor(value)?
        .iter()
        .map(|k| decode_posting(k))
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(TableEntry::Ancestor {
        document_id: utf8(key, "ancestor document id")?,
        postings,
    })
}

fn decode_scope_row(key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
    let name = utf8(key, "scope name")?;
    let (parent_path, field_name) = name
        .split_once(SCOPE_SEPARATOR)
        .ok_or_else(|| CoreError::invalid_format(format!("scope name {name:?} has no separator")))?;
    Ok(TableEntry::Scope {
        parent_path: parent_path.to_string(),
        field_name: field_name.to_string(),
        code: decode_code_value(value)?,
    })
}

fn decode_shard_row(key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
    Ok(TableEntry::Shard {
        name: utf8(key, "shard-key name")?,
        code: decode_code_value(value)?,
    })
}

fn decode_sequence_row(key: &[u8], value: &[u8]) -> CoreResult<TableEntry> {
    let raw: [u8; 8] = value.try_into().map_err(|_| {
        CoreError::invalid_format(format!("sequence value has {} bytes, expected 8", value.len()))
    })?;
    Ok(TableEntry::Sequence {
        key: utf8(key, "sequence key")?,
        next: i64::from_be_bytes(raw),
    })
}

/// A raw row with its decoded rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    /// Stored key.
    #[serde(serialize_with = "cursor::serialize_hex")]
    pub key: Vec<u8>,
    /// Stored value.
    #[serde(serialize_with = "cursor::serialize_hex")]
    pub value: Vec<u8>,
    /// Decoded row.
    pub entry: TableEntry,
}

/// One page of a table listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TablePage {
    /// Rows in key order.
    pub entries: Vec<RawEntry>,
    /// Continuation token, set when more rows remain.
    pub next_cursor: Option<String>,
}

/// Lists rows of one table, optionally restricted to a key prefix.
pub fn list_table<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    kind: TableKind,
    key_prefix: Option<&[u8]>,
    cursor: Option<Vec<u8>>,
    limit: usize,
) -> CoreResult<TablePage> {
    let table = ctx.tables().get(kind);
    let range = ScanRange::prefix(key_prefix.unwrap_or_default()).with_cursor(cursor);
    let page = ctx
        .retry()
        .run("list_table", |_| Ok(engine.scan(table, &range, limit)?))?;

    let entries = page
        .items
        .into_iter()
        .map(|(key, value)| {
            let entry = kind.decode(&key, &value)?;
            Ok(RawEntry { key, value, entry })
        })
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(TablePage {
        entries,
        next_cursor: page.next_cursor.as_deref().map(cursor::encode),
    })
}
