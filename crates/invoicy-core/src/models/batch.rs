//! Aggregate result of a batch run.

use chrono::{DateTime, Utc};

use crate::error::InvocationError;
use crate::runner::InvocationOutcome;

use super::document::{DocumentRef, ExtractedPayload};

/// Outcome for one input document.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// The document this entry answers for.
    pub document: DocumentRef,

    /// Payload on success, the failure reason otherwise.
    pub outcome: InvocationOutcome,

    /// Wall time from slot acquisition to outcome.
    pub elapsed_ms: u64,

    /// Progress steps the extractor reported, in order.
    pub progress: Vec<String>,
}

impl BatchEntry {
    pub fn new(document: DocumentRef, outcome: InvocationOutcome, elapsed_ms: u64) -> Self {
        Self {
            document,
            outcome,
            elapsed_ms,
            progress: Vec::new(),
        }
    }

    pub fn with_progress(mut self, progress: Vec<String>) -> Self {
        self.progress = progress;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn payload(&self) -> Option<&ExtractedPayload> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&InvocationError> {
        self.outcome.as_ref().err()
    }
}

/// One entry per input document, in input order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    entries: Vec<BatchEntry>,

    /// When the coordinator accepted the batch.
    pub started_at: DateTime<Utc>,

    /// When the last outcome arrived.
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn new(
        entries: Vec<BatchEntry>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entries,
            started_at,
            finished_at,
        }
    }

    /// A result for an empty batch.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self::new(Vec::new(), now, now)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BatchEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    /// Number of documents that produced a payload.
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    /// Number of documents that failed.
    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    /// Total wall time of the batch in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

impl<'a> IntoIterator for &'a BatchResult {
    type Item = &'a BatchEntry;
    type IntoIter = std::slice::Iter<'a, BatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
