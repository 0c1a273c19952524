//! Index update engine.
//!
//! Applies a batch of document updates by diffing each document's desired
//! postings against its ancestor record, one transaction per document.
//!
//! ## Protocol
//!
//! 1. Validate the whole batch. Nothing is opened if any record is invalid.
//! 2. Resolve scope and shard codes, memoized in a call-local [`BatchCodes`].
//! 3. Per document, under the namespace retry policy:
//!    - read the ancestor record (registered for conflict detection)
//!    - write postings that are desired but not live
//!    - delete live postings that are no longer desired, except that partial
//!      modes keep postings whose scope is not targeted
//!    - rewrite or delete the ancestor record only when something changed
//!    - commit
//!
//! Partial modes compare postings by scope code only (see
//! [`decode_scope`]); shard components do not take part in targeting.

use crate::error::{CoreError, CoreResult};
use crate::index::ancestor::AncestorStore;
use crate::index::codec::{decode_scope, encode_posting, ShardRef};
use crate::namespace::NamespaceContext;
use crate::registry::{scope_name, validate_scope_parts};
use crate::types::{ApplyStats, Code, DocumentUpdate, FieldRecord};
use docindex_kv::KvEngine;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// How a batch treats postings it does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Replace every posting of each document.
    Update,
    /// Replace postings of the scopes the records produce; keep the rest.
    PartialUpdate,
    /// Remove every posting and the ancestor record.
    Delete,
    /// Remove postings of the scopes the records name; keep the rest.
    PartialDelete,
}

impl ApplyMode {
    /// Maps the `partial` / `delete` request flags to a mode.
    #[must_use]
    pub const fn from_flags(partial: bool, delete: bool) -> Self {
        match (partial, delete) {
            (false, false) => ApplyMode::Update,
            (true, false) => ApplyMode::PartialUpdate,
            (false, true) => ApplyMode::Delete,
            (true, true) => ApplyMode::PartialDelete,
        }
    }

    /// Returns true for the partial modes.
    #[must_use]
    pub const fn is_partial(self) -> bool {
        matches!(self, ApplyMode::PartialUpdate | ApplyMode::PartialDelete)
    }

    /// Returns true for the delete modes.
    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, ApplyMode::Delete | ApplyMode::PartialDelete)
    }
}

/// Codes resolved during one batch.
#[derive(Debug, Default)]
pub struct BatchCodes {
    scopes: HashMap<String, Code>,
    shards: HashMap<String, Code>,
}

impl BatchCodes {
    /// Creates an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scope code of a field, registering it if needed.
    pub fn scope<E: KvEngine>(
        &mut self,
        engine: &E,
        ctx: &NamespaceContext,
        parent_path: &str,
        field_name: &str,
    ) -> CoreResult<Code> {
        let name = scope_name(parent_path, field_name);
        if let Some(code) = self.scopes.get(&name) {
            return Ok(*code);
        }
        let code = ctx.scopes().resolve_or_create(engine, &name)?;
        self.scopes.insert(name, code);
        Ok(code)
    }

    /// Returns the scope code of a field if it was ever registered.
    pub fn existing_scope<E: KvEngine>(
        &mut self,
        engine: &E,
        ctx: &NamespaceContext,
        parent_path: &str,
        field_name: &str,
    ) -> CoreResult<Option<Code>> {
        let name = scope_name(parent_path, field_name);
        if let Some(code) = self.scopes.get(&name) {
            return Ok(Some(*code));
        }
        let code = ctx.scopes().lookup(engine, &name)?;
        if let Some(code) = code {
            self.scopes.insert(name, code);
        }
        Ok(code)
    }

    /// Returns the code of a shard-key name, registering it if needed.
    pub fn shard<E: KvEngine>(
        &mut self,
        engine: &E,
        ctx: &NamespaceContext,
        name: &str,
    ) -> CoreResult<Code> {
        if let Some(code) = self.shards.get(name) {
            return Ok(*code);
        }
        let code = ctx.shards().resolve_or_create(engine, name)?;
        self.shards.insert(name.to_string(), code);
        Ok(code)
    }

    /// Number of distinct names resolved so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len() + self.shards.len()
    }

    /// Returns true if nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one document should look like after the batch.
#[derive(Debug)]
struct DocumentPlan<'a> {
    document_id: &'a str,
    desired: BTreeSet<Vec<u8>>,
    targeted: BTreeSet<Code>,
}

/// Checks a batch before anything touches the engine.
pub fn validate(updates: &[DocumentUpdate], mode: ApplyMode) -> CoreResult<()> {
    for update in updates {
        if update.document_id.trim().is_empty() {
            return Err(CoreError::validation("document id is blank"));
        }
        for record in &update.fields {
            if record.document_id != update.document_id {
                return Err(CoreError::validation(format!(
                    "record for document {:?} grouped under {:?}",
                    record.document_id, update.document_id
                )));
            }
            // A full delete ignores its records; bare marker records are fine.
            if mode == ApplyMode::Delete {
                continue;
            }
            validate_record(record)?;
        }
    }
    Ok(())
}

fn validate_record(record: &FieldRecord) -> CoreResult<()> {
    if record.field_name.trim().is_empty() && record.shard_keys.is_empty() {
        return Err(CoreError::validation(format!(
            "document {:?}: field name is blank and no shard key is given",
            record.document_id
        )));
    }
    validate_scope_parts(&record.parent_path, &record.field_name)?;
    for shard in &record.shard_keys {
        if shard.name.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "document {:?}: shard-key name is blank",
                record.document_id
            )));
        }
        if shard.value.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "document {:?}: shard key {:?} has a blank value",
                record.document_id, shard.name
            )));
        }
    }
    Ok(())
}

fn plan_document<'a, E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    codes: &mut BatchCodes,
    update: &'a DocumentUpdate,
    mode: ApplyMode,
) -> CoreResult<DocumentPlan<'a>> {
    let document_id = update.document_id.as_str();
    let mut desired = BTreeSet::new();
    let mut targeted = BTreeSet::new();

    match mode {
        ApplyMode::Delete => {}
        ApplyMode::PartialDelete => {
            // A scope that was never registered cannot hold postings.
            for record in &update.fields {
                if let Some(code) =
                    codes.existing_scope(engine, ctx, &record.parent_path, &record.field_name)?
                {
                    targeted.insert(code);
                }
            }
        }
        ApplyMode::Update | ApplyMode::PartialUpdate => {
            for record in &update.fields {
                if record.is_empty_contribution() {
                    continue;
                }
                let scope = codes.scope(engine, ctx, &record.parent_path, &record.field_name)?;
                if !record.value.is_empty() {
                    desired.insert(encode_posting(scope, document_id, &record.value, None)?);
                }
                for shard in &record.shard_keys {
                    let shard_ref = ShardRef {
                        code: codes.shard(engine, ctx, &shard.name)?,
                        value: &shard.value,
                    };
                    desired.insert(encode_posting(
                        scope,
                        document_id,
                        &record.value,
                        Some(shard_ref),
                    )?);
                }
            }
            if mode == ApplyMode::PartialUpdate {
                for key in &desired {
                    targeted.insert(decode_scope(key)?);
                }
            }
        }
    }

    Ok(DocumentPlan {
        document_id,
        desired,
        targeted,
    })
}

/// Applies a batch of document updates.
///
/// # Errors
///
/// - [`CoreError::Validation`] before any transaction for a malformed batch
/// - [`CoreError::Io`] when a document keeps conflicting past the retry
///   budget; documents committed before it stay committed
/// - registry and engine errors otherwise
pub fn apply<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    updates: &[DocumentUpdate],
    mode: ApplyMode,
) -> CoreResult<ApplyStats> {
    validate(updates, mode)?;

    let mut codes = BatchCodes::new();
    let plans = updates
        .iter()
        .map(|update| plan_document(engine, ctx, &mut codes, update, mode))
        .collect::<CoreResult<Vec<_>>>()?;

    let mut stats = ApplyStats::default();
    for plan in &plans {
        let doc_stats = ctx
            .retry()
            .run("apply_index", |_| apply_document(engine, ctx, plan, mode))?;
        debug!(
            namespace = ctx.name(),
            document = plan.document_id,
            added = doc_stats.postings_added,
            removed = doc_stats.postings_removed,
            "indexed document"
        );
        stats.merge(doc_stats);
    }
    Ok(stats)
}

fn apply_document<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    plan: &DocumentPlan<'_>,
    mode: ApplyMode,
) -> CoreResult<ApplyStats> {
    let mut txn = engine.begin()?;
    match stage_document(engine, ctx, &mut txn, plan, mode) {
        Ok(stats) if stats.is_noop() => {
            engine.abort(txn);
            Ok(stats)
        }
        Ok(stats) => {
            engine.commit(txn)?;
            Ok(stats)
        }
        Err(err) => {
            engine.abort(txn);
            Err(err)
        }
    }
}

fn stage_document<E: KvEngine>(
    engine: &E,
    ctx: &NamespaceContext,
    txn: &mut E::Txn,
    plan: &DocumentPlan<'_>,
    mode: ApplyMode,
) -> CoreResult<ApplyStats> {
    let index_table = ctx.tables().index.as_str();
    let ancestors = AncestorStore::new(engine, &ctx.tables().ancestor);
    let document_id = plan.document_id;

    let current: BTreeSet<Vec<u8>> = ancestors
        .read(txn, document_id)?
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut stats = ApplyStats {
        documents: 1,
        ..ApplyStats::default()
    };

    for key in plan.desired.difference(&current) {
        engine.put(txn, index_table, key, document_id.as_bytes())?;
        stats.postings_added += 1;
    }

    let mut kept = Vec::new();
    for key in current.difference(&plan.desired) {
        let remove = if mode.is_partial() {
            plan.targeted.contains(&decode_scope(key)?)
        } else {
            true
        };
        if remove {
            engine.delete(txn, index_table, key)?;
            stats.postings_removed += 1;
        } else {
            kept.push(key);
        }
    }

    if stats.postings_added == 0 && stats.postings_removed == 0 {
        return Ok(stats);
    }

    let live: BTreeSet<&Vec<u8>> = plan.desired.iter().chain(kept).collect();
    if live.is_empty() {
        ancestors.delete(txn, document_id)?;
        stats.ancestors_deleted += 1;
    } else {
        let live: Vec<Vec<u8>> = live.into_iter().cloned().collect();
        ancestors.write(txn, document_id, &live)?;
        stats.ancestors_written += 1;
    }
    Ok(stats)
}
