//! Service facade used by the index-serving layer.

use crate::config::ServiceConfig;
use crate::cursor;
use crate::error::CoreResult;
use crate::index::query::{run_query, Query, QueryPage};
use crate::index::update::{apply, ApplyMode};
use crate::namespace::NamespaceContext;
use crate::tables::{list_table, TableKind, TablePage};
use crate::types::{ApplyStats, DocumentUpdate, FieldRecord};
use docindex_kv::KvEngine;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Multi-tenant index service over one engine.
///
/// Namespace contexts (table names, configuration, registry caches) are
/// created on first use and live until [`IndexService::unload_namespace`].
/// The service is `Send + Sync`; correctness under concurrency comes from
/// the engine's transactions, not from locks held here.
///
/// # Example
///
/// ```rust
/// use docindex_core::{Condition, FieldRecord, IndexService, Operator, Query};
/// use docindex_kv::InMemoryEngine;
///
/// let service = IndexService::new(InMemoryEngine::new());
/// service
///     .apply_index("acme", vec![FieldRecord::new("d1", "", "name", "alice")], false, false)
///     .unwrap();
///
/// let query = Query::new("", Condition::new("name", Operator::Eq, "alice"));
/// let page = service.query_keys("acme", &query).unwrap();
/// assert_eq!(page.ids, vec!["d1".to_string()]);
/// ```
#[derive(Debug)]
pub struct IndexService<E: KvEngine> {
    engine: E,
    config: ServiceConfig,
    namespaces: RwLock<HashMap<String, Arc<NamespaceContext>>>,
}

impl<E: KvEngine> IndexService<E> {
    /// Creates a service with the default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ServiceConfig::default())
    }

    /// Creates a service with the given configuration.
    pub fn with_config(engine: E, config: ServiceConfig) -> Self {
        Self {
            engine,
            config,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the context of a namespace, loading it on first use.
    pub fn namespace(&self, namespace: &str) -> CoreResult<Arc<NamespaceContext>> {
        if let Some(ctx) = self.namespaces.read().get(namespace) {
            return Ok(Arc::clone(ctx));
        }
        let mut namespaces = self.namespaces.write();
        if let Some(ctx) = namespaces.get(namespace) {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(NamespaceContext::new(
            namespace,
            self.config.for_namespace(namespace),
        )?);
        namespaces.insert(namespace.to_string(), Arc::clone(&ctx));
        info!(namespace, "loaded namespace");
        Ok(ctx)
    }

    /// Drops a namespace's cached state. Stored data is untouched.
    ///
    /// Returns true if the namespace was loaded.
    pub fn unload_namespace(&self, namespace: &str) -> bool {
        let removed = self.namespaces.write().remove(namespace).is_some();
        if removed {
            info!(namespace, "unloaded namespace");
        }
        removed
    }

    /// Returns the names of loaded namespaces, sorted.
    pub fn loaded_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Applies flat field records, grouped by document id.
    pub fn apply_index(
        &self,
        namespace: &str,
        records: Vec<FieldRecord>,
        partial: bool,
        delete: bool,
    ) -> CoreResult<ApplyStats> {
        self.apply_documents(namespace, DocumentUpdate::group(records), partial, delete)
    }

    /// Applies per-document updates.
    ///
    /// A full delete (`delete && !partial`) may name documents without any
    /// field records.
    pub fn apply_documents(
        &self,
        namespace: &str,
        updates: Vec<DocumentUpdate>,
        partial: bool,
        delete: bool,
    ) -> CoreResult<ApplyStats> {
        let ctx = self.namespace(namespace)?;
        apply(
            &self.engine,
            &ctx,
            &updates,
            ApplyMode::from_flags(partial, delete),
        )
    }

    /// Returns one page of document ids matching a query.
    pub fn query_keys(&self, namespace: &str, query: &Query) -> CoreResult<QueryPage> {
        let ctx = self.namespace(namespace)?;
        run_query(&self.engine, &ctx, query)
    }

    /// Lists raw rows of one of the namespace's tables.
    ///
    /// `table_name` is one of `index`, `ancestor`, `scope`, `shard` or
    /// `sequence`.
    pub fn list_table(
        &self,
        namespace: &str,
        table_name: &str,
        key_prefix: Option<&[u8]>,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> CoreResult<TablePage> {
        let kind: TableKind = table_name.parse()?;
        let cursor = cursor::decode_opt(cursor)?;
        let ctx = self.namespace(namespace)?;
        let limit = ctx.config().page_limit(limit);
        list_table(&self.engine, &ctx, kind, key_prefix, cursor, limit)
    }
}
