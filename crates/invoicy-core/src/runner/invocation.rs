//! Lifecycle of a single extractor invocation.

use tracing::{debug, warn};

use super::InvocationReport;
use crate::error::InvocationError;
use crate::models::document::{DocumentRef, ExtractedPayload};
use crate::scraper;

/// Exit status of the extractor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    /// Process has not exited (or never started).
    Pending,
    /// Exited normally with this code.
    Code(i32),
    /// Terminated by a signal, when the platform reports one.
    Killed(Option<i32>),
}

impl ExitState {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitState::Code(code),
            None => ExitState::Killed(termination_signal(&status)),
        }
    }
}

#[cfg(unix)]
fn termination_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Where an invocation is in its lifecycle.
///
/// `Pending → Running → Succeeded | Failed`. An invocation that never gets a
/// process (missing document, launch failure) goes straight from `Pending`
/// to `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationState {
    Pending,
    Running { pid: Option<u32> },
    Succeeded(ExtractedPayload),
    Failed(InvocationError),
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationState::Succeeded(_) | InvocationState::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            InvocationState::Pending => "pending",
            InvocationState::Running { .. } => "running",
            InvocationState::Succeeded(_) => "succeeded",
            InvocationState::Failed(_) => "failed",
        }
    }
}

/// One document bound to one extractor execution.
///
/// Owned exclusively by the runner driving it.
#[derive(Debug)]
pub struct ExtractionInvocation {
    document: DocumentRef,
    stdout: String,
    stderr: String,
    progress: Vec<String>,
    exit: ExitState,
    state: InvocationState,
}

impl ExtractionInvocation {
    pub fn new(document: DocumentRef) -> Self {
        Self {
            document,
            stdout: String::new(),
            stderr: String::new(),
            progress: Vec::new(),
            exit: ExitState::Pending,
            state: InvocationState::Pending,
        }
    }

    pub fn exit(&self) -> ExitState {
        self.exit
    }

    pub fn state(&self) -> &InvocationState {
        &self.state
    }

    /// Mark the process as started.
    pub fn start(&mut self, pid: Option<u32>) {
        if self.state != InvocationState::Pending {
            warn!(
                "[{}] start requested in state {}",
                self.document,
                self.state.label()
            );
            return;
        }
        self.transition(InvocationState::Running { pid });
    }

    pub fn append_stdout(&mut self, text: &str) {
        self.stdout.push_str(text);
    }

    pub fn append_stderr(&mut self, text: &str) {
        self.stderr.push_str(text);
    }

    pub fn record_progress(&mut self, step: impl Into<String>) {
        self.progress.push(step.into());
    }

    pub fn record_exit(&mut self, exit: ExitState) {
        self.exit = exit;
    }

    /// Settle the invocation from its exit status and captured output.
    ///
    /// Exit code zero hands stdout to the scraper; anything else is a
    /// process failure carrying stderr.
    pub fn conclude(&mut self, marker: &str) {
        let result = match self.exit {
            ExitState::Code(0) => scraper::extract_with_marker(&self.stdout, marker)
                .map_err(InvocationError::from),
            ExitState::Code(code) => Err(self.process_failure(Some(code), None)),
            ExitState::Killed(signal) => Err(self.process_failure(None, signal)),
            ExitState::Pending => Err(self.process_failure(None, None)),
        };

        match result {
            Ok(payload) => self.succeed(payload),
            Err(error) => self.fail(error),
        }
    }

    pub fn succeed(&mut self, payload: ExtractedPayload) {
        self.settle(InvocationState::Succeeded(payload));
    }

    pub fn fail(&mut self, error: InvocationError) {
        self.settle(InvocationState::Failed(error));
    }

    /// Fail after losing the extractor's output streams.
    ///
    /// Whatever stderr was captured before the error is kept; the read
    /// error becomes the diagnostic.
    pub fn fail_unreadable(&mut self, error: &std::io::Error) {
        let (code, signal) = match self.exit {
            ExitState::Code(code) => (Some(code), None),
            ExitState::Killed(signal) => (None, signal),
            ExitState::Pending => (None, None),
        };
        let failure = InvocationError::ProcessFailure {
            code,
            signal,
            stderr: self.stderr.clone(),
            diagnostic: Some(error.to_string()),
        };
        self.fail(failure);
    }

    /// Consume the invocation, yielding its outcome and progress steps.
    pub fn into_report(self) -> InvocationReport {
        let outcome = match self.state {
            InvocationState::Succeeded(payload) => Ok(payload),
            InvocationState::Failed(error) => Err(error),
            other => Err(InvocationError::TaskFailed {
                reason: format!("invocation ended while {}", other.label()),
            }),
        };
        InvocationReport {
            outcome,
            progress: self.progress,
        }
    }

    fn process_failure(&self, code: Option<i32>, signal: Option<i32>) -> InvocationError {
        InvocationError::ProcessFailure {
            code,
            signal,
            stderr: self.stderr.clone(),
            diagnostic: scraper::stderr_diagnostic(&self.stderr),
        }
    }

    fn settle(&mut self, next: InvocationState) {
        if self.state.is_terminal() {
            warn!(
                "[{}] already {}, ignoring {}",
                self.document,
                self.state.label(),
                next.label()
            );
            return;
        }
        self.transition(next);
    }

    fn transition(&mut self, next: InvocationState) {
        debug!(
            "[{}] {} -> {}",
            self.document,
            self.state.label(),
            next.label()
        );
        self.state = next;
    }
}
