//! Fan-out of documents to extractor invocations and fan-in of their outcomes.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::{AbortHandle, JoinSet};
use tracing::{error, info, warn};

use crate::error::{BatchError, InvocationError, StoreError};
use crate::models::batch::{BatchEntry, BatchResult};
use crate::models::document::DocumentRef;
use crate::runner::{Extractor, InvocationReport};
use crate::store::{DocumentStore, validate_name};

/// Drives one extractor invocation per document under a concurrency cap.
///
/// The cap belongs to the coordinator and is shared by its clones, so
/// concurrent batches together never run more than `concurrency_limit`
/// extractors. Per-document failures become entries of the result; only
/// input validation can fail a whole batch, and it does so before anything
/// runs.
#[derive(Clone)]
pub struct BatchCoordinator {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn Extractor>,
    gate: Arc<Semaphore>,
    concurrency_limit: usize,
}

/// Aborts a spawned task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl BatchCoordinator {
    /// `concurrency_limit` caps the extractors running at once, across all
    /// calls on this coordinator.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn Extractor>,
        concurrency_limit: usize,
    ) -> Result<Self, BatchError> {
        if concurrency_limit == 0 {
            return Err(BatchError::InvalidConcurrency(concurrency_limit));
        }
        Ok(Self {
            store,
            extractor,
            gate: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
        })
    }

    /// Coordinator-wide cap on running extractors.
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Process a single document. Same path as any batch, with one entry.
    pub async fn process_one(&self, document: DocumentRef) -> Result<BatchEntry, BatchError> {
        let name = document.name().to_string();
        let mut entries = self.process_batch(vec![document], 1).await?.into_entries();
        Ok(entries.pop().unwrap_or_else(|| {
            BatchEntry::new(
                DocumentRef::new(name),
                Err(InvocationError::TaskFailed {
                    reason: "batch produced no entry".to_string(),
                }),
                0,
            )
        }))
    }

    /// Process `documents` with at most `concurrency_limit` of them in
    /// flight, within the coordinator-wide cap. The result holds one entry
    /// per input, in input order.
    pub async fn process_batch(
        &self,
        documents: Vec<DocumentRef>,
        concurrency_limit: usize,
    ) -> Result<BatchResult, BatchError> {
        if concurrency_limit == 0 {
            return Err(BatchError::InvalidConcurrency(concurrency_limit));
        }
        for document in &documents {
            validate_name(document.name()).map_err(|reason| BatchError::InvalidDocumentName {
                name: document.name().to_string(),
                reason,
            })?;
        }

        if documents.is_empty() {
            return Ok(BatchResult::empty());
        }

        let started_at = Utc::now();
        let total = documents.len();
        info!(
            "Processing batch of {} documents (concurrency {}, shared cap {})",
            total, concurrency_limit, self.concurrency_limit
        );

        let batch_gate = Arc::new(Semaphore::new(concurrency_limit));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<BatchEntry>> = (0..total).map(|_| None).collect();

        // Slots are taken here, in input order, so dispatch follows the input.
        for (index, document) in documents.iter().cloned().enumerate() {
            let Ok(permits) = acquire_slots(&batch_gate, &self.gate).await else {
                slots[index] = Some(task_failure(document, "concurrency gate closed"));
                continue;
            };

            let store = Arc::clone(&self.store);
            let extractor = Arc::clone(&self.extractor);

            tasks.spawn(async move {
                let started = Instant::now();

                // The worker holds the slots until the invocation ends. It is
                // aborted along with this task, which kills its extractor. A
                // panic inside it is reported against this document.
                let worker = tokio::spawn({
                    let document = document.clone();
                    async move {
                        let _permits = permits;
                        run_document(store, extractor, document).await
                    }
                });
                let _abort = AbortOnDrop(worker.abort_handle());

                let report = match worker.await {
                    Ok(report) => report,
                    Err(e) => {
                        error!("[{}] Invocation task failed: {}", document, e);
                        InvocationReport::from(Err(InvocationError::TaskFailed {
                            reason: e.to_string(),
                        }))
                    }
                };

                let elapsed_ms = started.elapsed().as_millis() as u64;
                let entry = BatchEntry::new(document, report.outcome, elapsed_ms)
                    .with_progress(report.progress);
                (index, entry)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(e) => error!("Batch task failed: {}", e),
            }
        }

        let entries: Vec<BatchEntry> = slots
            .into_iter()
            .zip(documents)
            .map(|(slot, document)| {
                slot.unwrap_or_else(|| task_failure(document, "no outcome recorded"))
            })
            .collect();

        let result = BatchResult::new(entries, started_at, Utc::now());
        info!(
            "Batch complete: {} succeeded, {} failed in {}ms",
            result.succeeded(),
            result.failed(),
            result.duration_ms()
        );

        Ok(result)
    }
}

/// Take a slot from the batch's own gate, then from the shared one.
async fn acquire_slots(
    batch_gate: &Arc<Semaphore>,
    shared_gate: &Arc<Semaphore>,
) -> Result<(OwnedSemaphorePermit, OwnedSemaphorePermit), AcquireError> {
    let own = Arc::clone(batch_gate).acquire_owned().await?;
    let shared = Arc::clone(shared_gate).acquire_owned().await?;
    Ok((own, shared))
}

async fn run_document(
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn Extractor>,
    document: DocumentRef,
) -> InvocationReport {
    let report = match store.open(document.name()) {
        Ok(path) => extractor.run_reported(&document, &path).await,
        Err(StoreError::NotFound(_)) | Err(StoreError::InvalidName { .. }) => {
            InvocationReport::from(Err(InvocationError::DocumentNotFound {
                document: document.name().to_string(),
            }))
        }
        Err(StoreError::Io(e)) => {
            warn!("[{}] Document unreadable: {}", document, e);
            InvocationReport::from(Err(InvocationError::DocumentNotFound {
                document: document.name().to_string(),
            }))
        }
    };

    if let Err(e) = &report.outcome {
        warn!("[{}] Failed ({}): {}", document, e.kind(), e);
    }

    report
}

fn task_failure(document: DocumentRef, reason: &str) -> BatchEntry {
    BatchEntry::new(
        document,
        Err(InvocationError::TaskFailed {
            reason: reason.to_string(),
        }),
        0,
    )
}
