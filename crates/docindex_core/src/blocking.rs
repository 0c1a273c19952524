//! Async adapter for use inside a tokio runtime.
//!
//! Every service call blocks on the engine, so each one is moved to
//! tokio's blocking pool.

use crate::error::{CoreError, CoreResult};
use crate::index::query::{Query, QueryPage};
use crate::service::IndexService;
use crate::tables::TablePage;
use crate::types::{ApplyStats, DocumentUpdate, FieldRecord};
use docindex_kv::{KvEngine, KvError};
use std::sync::Arc;

/// Async handle over a shared [`IndexService`].
#[derive(Debug)]
pub struct AsyncIndexService<E: KvEngine + 'static> {
    inner: Arc<IndexService<E>>,
}

impl<E: KvEngine + 'static> Clone for AsyncIndexService<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: KvEngine + 'static> AsyncIndexService<E> {
    /// Wraps a service.
    pub fn new(service: IndexService<E>) -> Self {
        Self::from_arc(Arc::new(service))
    }

    /// Wraps an already shared service.
    pub fn from_arc(inner: Arc<IndexService<E>>) -> Self {
        Self { inner }
    }

    /// Returns the wrapped service.
    pub fn service(&self) -> &Arc<IndexService<E>> {
        &self.inner
    }

    async fn offload<T, F>(&self, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&IndexService<E>) -> CoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|err| {
                CoreError::Engine(KvError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("blocking task failed: {err}"),
                )))
            })?
    }

    /// See [`IndexService::apply_index`].
    pub async fn apply_index(
        &self,
        namespace: String,
        records: Vec<FieldRecord>,
        partial: bool,
        delete: bool,
    ) -> CoreResult<ApplyStats> {
        self.offload(move |svc| svc.apply_index(&namespace, records, partial, delete))
            .await
    }

    /// See [`IndexService::apply_documents`].
    pub async fn apply_documents(
        &self,
        namespace: String,
        updates: Vec<DocumentUpdate>,
        partial: bool,
        delete: bool,
    ) -> CoreResult<ApplyStats> {
        self.offload(move |svc| svc.apply_documents(&namespace, updates, partial, delete))
            .await
    }

    /// See [`IndexService::query_keys`].
    pub async fn query_keys(&self, namespace: String, query: Query) -> CoreResult<QueryPage> {
        self.offload(move |svc| svc.query_keys(&namespace, &query))
            .await
    }

    /// See [`IndexService::list_table`].
    pub async fn list_table(
        &self,
        namespace: String,
        table_name: String,
        key_prefix: Option<Vec<u8>>,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> CoreResult<TablePage> {
        self.offload(move |svc| {
            svc.list_table(
                &namespace,
                &table_name,
                key_prefix.as_deref(),
                cursor.as_deref(),
                limit,
            )
        })
        .await
    }
}
