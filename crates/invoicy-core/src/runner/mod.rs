//! Extraction runner: one external process per document.

mod invocation;
mod process;

pub use invocation::{ExitState, ExtractionInvocation, InvocationState};
pub use process::ProcessRunner;

use std::path::Path;

use async_trait::async_trait;

use crate::error::InvocationError;
use crate::models::document::{DocumentRef, ExtractedPayload};

/// Outcome of one invocation.
pub type InvocationOutcome = std::result::Result<ExtractedPayload, InvocationError>;

/// Outcome of one invocation along with what the extractor reported on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationReport {
    pub outcome: InvocationOutcome,

    /// `Progress:` steps, in the order they were printed.
    pub progress: Vec<String>,
}

impl From<InvocationOutcome> for InvocationReport {
    fn from(outcome: InvocationOutcome) -> Self {
        Self {
            outcome,
            progress: Vec::new(),
        }
    }
}

/// Something that turns one stored document into a payload.
///
/// Each call is independent; callers enforce any concurrency limit.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Run extraction for `document`, stored at `path`.
    async fn run(&self, document: &DocumentRef, path: &Path) -> InvocationOutcome;

    /// Like [`Extractor::run`], also returning the progress steps reported
    /// while running. Extractors without progress reporting keep the default.
    async fn run_reported(&self, document: &DocumentRef, path: &Path) -> InvocationReport {
        self.run(document, path).await.into()
    }
}
