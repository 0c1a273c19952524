//! Namespace-scoped state.
//!
//! A [`NamespaceContext`] bundles everything one tenant keyspace needs: its
//! table names, effective configuration, retry policy and the two name
//! registries with their code caches. Contexts are created on first use and
//! dropped when the namespace is unloaded.

use crate::config::IndexConfig;
use crate::error::{CoreError, CoreResult};
use crate::registry::NameRegistry;
use crate::retry::RetryPolicy;
use crate::tables::TableKind;

/// Sequence key minting scope codes.
pub const SCOPE_SEQUENCE_KEY: &[u8] = b"scope";
/// Sequence key minting shard-key codes.
pub const SHARD_SEQUENCE_KEY: &[u8] = b"shard";

/// Checks that a namespace name can prefix table names.
///
/// Names must be non-blank and contain neither `.` nor whitespace.
pub fn validate_namespace(namespace: &str) -> CoreResult<()> {
    if namespace.is_empty() {
        return Err(CoreError::validation("namespace is blank"));
    }
    if namespace.contains('.') || namespace.chars().any(char::is_whitespace) {
        return Err(CoreError::validation(format!(
            "namespace {namespace:?} must not contain '.' or whitespace"
        )));
    }
    Ok(())
}

/// Physical table names of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Postings.
    pub index: String,
    /// Ancestor records.
    pub ancestor: String,
    /// Scope registry.
    pub scope: String,
    /// Shard-key registry.
    pub shard: String,
    /// Registry sequences.
    pub sequence: String,
}

impl TableNames {
    /// Derives table names as `{namespace}.{table}`.
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        let name = |kind: TableKind| format!("{namespace}.{}", kind.as_str());
        Self {
            index: name(TableKind::Index),
            ancestor: name(TableKind::Ancestor),
            scope: name(TableKind::Scope),
            shard: name(TableKind::Shard),
            sequence: name(TableKind::Sequence),
        }
    }

    /// Returns the physical name of a table kind.
    #[must_use]
    pub fn get(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Index => &self.index,
            TableKind::Ancestor => &self.ancestor,
            TableKind::Scope => &self.scope,
            TableKind::Shard => &self.shard,
            TableKind::Sequence => &self.sequence,
        }
    }
}

/// State of one loaded namespace.
#[derive(Debug)]
pub struct NamespaceContext {
    name: String,
    tables: TableNames,
    config: IndexConfig,
    retry: RetryPolicy,
    scopes: NameRegistry,
    shards: NameRegistry,
}

impl NamespaceContext {
    /// Creates the context of a namespace.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the namespace name is invalid.
    pub fn new(name: &str, config: IndexConfig) -> CoreResult<Self> {
        validate_namespace(name)?;
        let tables = TableNames::new(name);
        let retry = RetryPolicy::from_config(&config);
        let scopes = NameRegistry::new(
            tables.scope.clone(),
            tables.sequence.clone(),
            SCOPE_SEQUENCE_KEY,
            retry,
        );
        let shards = NameRegistry::new(
            tables.shard.clone(),
            tables.sequence.clone(),
            SHARD_SEQUENCE_KEY,
            retry,
        );
        Ok(Self {
            name: name.to_string(),
            tables,
            config,
            retry,
            scopes,
            shards,
        })
    }

    /// Returns the namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table names.
    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the scope registry.
    #[must_use]
    pub fn scopes(&self) -> &NameRegistry {
        &self.scopes
    }

    /// Returns the shard-key registry.
    #[must_use]
    pub fn shards(&self) -> &NameRegistry {
        &self.shards
    }
}
