//! Stress helpers for docindex.
//!
//! These drive a shared service from several threads to exercise registry
//! races and per-document transaction conflicts.

use docindex_core::{Code, FieldRecord, IndexService};
use docindex_kv::KvEngine;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// What a concurrent-writer run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriterOutcome {
    /// `apply_index` calls that succeeded.
    pub applied: usize,
    /// `apply_index` calls that returned an error.
    pub failed: usize,
    /// Postings written across all successful calls.
    pub postings_added: usize,
    /// Postings removed across all successful calls.
    pub postings_removed: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl WriterOutcome {
    /// Successful calls per second.
    #[must_use]
    pub fn applies_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.applied as f64 / secs
        } else {
            0.0
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct documents written.
    pub documents: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            documents: 16,
        }
    }
}

/// Resolves the same fresh scope name from every thread at once and returns
/// the code each thread saw.
pub fn race_scope_registration<E: KvEngine + 'static>(
    service: Arc<IndexService<E>>,
    namespace: &str,
    name: &str,
    threads: usize,
) -> Vec<Code> {
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let namespace = namespace.to_string();
            let name = name.to_string();
            thread::spawn(move || {
                let ctx = service.namespace(&namespace).expect("namespace should load");
                barrier.wait();
                ctx.scopes()
                    .resolve_or_create(service.engine(), &name)
                    .expect("registration should succeed")
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect()
}

/// Rewrites a small set of documents from several threads.
///
/// Threads pick documents round-robin, so concurrent updates of one
/// document are common and must be resolved by retries.
pub fn stress_concurrent_updates<E: KvEngine + 'static>(
    service: Arc<IndexService<E>>,
    namespace: &str,
    config: &StressConfig,
) -> WriterOutcome {
    let outcome = Arc::new(Mutex::new(WriterOutcome::default()));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let service = Arc::clone(&service);
            let outcome = Arc::clone(&outcome);
            let namespace = namespace.to_string();
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.operations {
                    let doc = format!("doc-{}", (t + i) % config.documents.max(1));
                    let records = vec![
                        FieldRecord::new(doc.clone(), "", "writer", format!("t{t}")),
                        FieldRecord::new(doc, "", "step", format!("{i:06}")),
                    ];
                    let result = service.apply_index(&namespace, records, false, false);
                    let mut outcome = outcome.lock();
                    match result {
                        Ok(stats) => {
                            outcome.applied += 1;
                            outcome.postings_added += stats.postings_added;
                            outcome.postings_removed += stats.postings_removed;
                        }
                        Err(_) => outcome.failed += 1,
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut outcome = outcome.lock().clone();
    outcome.elapsed = start.elapsed();
    outcome
}
