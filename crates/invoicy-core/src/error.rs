//! Error types for the invoicy-core library.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the invoicy library.
#[derive(Error, Debug)]
pub enum InvoicyError {
    /// Batch was rejected before dispatch.
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that reject a whole batch. Raised before any document is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Concurrency limit must be at least one.
    #[error("invalid concurrency limit: {0} (must be >= 1)")]
    InvalidConcurrency(usize),

    /// A document identifier is not a plain file name.
    #[error("invalid document name {name:?}: {reason}")]
    InvalidDocumentName { name: String, reason: String },
}

/// Errors raised by a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Name is not a plain file name inside the store.
    #[error("invalid document name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// No readable file with that name.
    #[error("document not found: {0}")]
    NotFound(String),

    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to recover a payload from extractor output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// The marker prefix never appears in the captured text.
    #[error("no output data found in extractor output")]
    NoMarkerFound,

    /// Marker found but the rest of the line is not valid JSON.
    #[error("malformed output data: {0}")]
    MalformedPayload(String),
}

/// Per-document failure. Always turned into a batch entry, never propagated
/// past the batch boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationError {
    /// Referenced file absent from the store at dispatch time.
    #[error("document not found: {document}")]
    DocumentNotFound { document: String },

    /// The extractor program could not be started.
    #[error("failed to launch extractor: {reason}")]
    LaunchFailed { reason: String },

    /// Extractor exited non-zero or was killed.
    #[error("extractor {}{}", exit_label(.code, .signal), diagnostic_suffix(.diagnostic))]
    ProcessFailure {
        code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
        diagnostic: Option<String>,
    },

    /// Extractor did not finish before its deadline.
    #[error("extractor timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Extractor succeeded but printed no marker line.
    #[error("no output data found in extractor output")]
    NoMarkerFound,

    /// Marker line present but not valid JSON.
    #[error("malformed output data: {reason}")]
    MalformedPayload { reason: String },

    /// The task driving the invocation died (panic or abort).
    #[error("invocation task failed: {reason}")]
    TaskFailed { reason: String },
}

impl InvocationError {
    /// Stable identifier of the failure kind, as used in serialized output.
    pub fn kind(&self) -> &'static str {
        match self {
            InvocationError::DocumentNotFound { .. } => "document_not_found",
            InvocationError::LaunchFailed { .. } => "launch_failed",
            InvocationError::ProcessFailure { .. } => "process_failure",
            InvocationError::Timeout { .. } => "timeout",
            InvocationError::NoMarkerFound => "no_marker_found",
            InvocationError::MalformedPayload { .. } => "malformed_payload",
            InvocationError::TaskFailed { .. } => "task_failed",
        }
    }
}

impl From<ScrapeError> for InvocationError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::NoMarkerFound => InvocationError::NoMarkerFound,
            ScrapeError::MalformedPayload(reason) => InvocationError::MalformedPayload { reason },
        }
    }
}

fn exit_label(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exited with code {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => "terminated abnormally".to_string(),
    }
}

fn diagnostic_suffix(diagnostic: &Option<String>) -> String {
    diagnostic
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

/// Result type for the invoicy library.
pub type Result<T> = std::result::Result<T, InvoicyError>;
