//! Core library for invoicy, the invoice processing orchestrator.
//!
//! This crate provides:
//! - A read-only document store abstraction over the uploads directory
//! - An extraction runner driving one external extractor process per document
//! - Scraping of the `output data: <json>` result line from extractor output
//! - Bounded-concurrency batch coordination with per-document failure containment
//! - JSON presentation of batch results for the web UI

pub mod batch;
pub mod error;
pub mod models;
pub mod presenter;
pub mod runner;
pub mod scraper;
pub mod store;

pub use batch::BatchCoordinator;
pub use error::{BatchError, InvocationError, InvoicyError, Result, ScrapeError, StoreError};
pub use models::batch::{BatchEntry, BatchResult};
pub use models::config::InvoicyConfig;
pub use models::document::{DocumentRef, ExtractedPayload};
pub use presenter::Presenter;
pub use runner::{Extractor, InvocationOutcome, InvocationReport, ProcessRunner};
pub use store::{DocumentStore, FsDocumentStore};

use std::sync::Arc;

/// Build a coordinator over the configured uploads directory and extractor,
/// capped at the configured concurrency limit.
pub fn coordinator_from_config(config: &InvoicyConfig) -> Result<BatchCoordinator> {
    let coordinator = BatchCoordinator::new(
        Arc::new(FsDocumentStore::new(&config.store.uploads_dir)),
        Arc::new(ProcessRunner::from_config(&config.extractor)),
        config.batch.concurrency_limit,
    )?;
    Ok(coordinator)
}
