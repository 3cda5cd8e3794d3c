//! Extractor backed by an external program.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::invocation::{ExitState, ExtractionInvocation};
use super::{Extractor, InvocationOutcome, InvocationReport};
use crate::error::InvocationError;
use crate::models::config::ExtractorConfig;
use crate::models::document::DocumentRef;
use crate::scraper;

/// Runs `<program> <args...> <document path>` and scrapes its stdout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    marker: String,
    timeout: Option<Duration>,
}

/// Text captured from one output stream.
#[derive(Debug, Default)]
struct Captured {
    text: String,
    progress: Vec<String>,
    /// Read error that ended the capture early.
    error: Option<std::io::Error>,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl ProcessRunner {
    /// Create a runner for `program` with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            marker: scraper::DEFAULT_MARKER.to_string(),
            timeout: None,
        }
    }

    /// Build a runner from configuration.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            marker: config.marker.clone(),
            timeout: config.timeout(),
        }
    }

    /// Arguments placed before the document path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory of the extractor.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the marker prefix of the result line.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Kill the extractor if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        command
    }

    /// Drain both pipes and wait for exit.
    async fn drive(
        child: &mut Child,
        document: &str,
    ) -> (Captured, Captured, std::io::Result<std::process::ExitStatus>) {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (out, err) = tokio::join!(
            pump(stdout, Stream::Stdout, document),
            pump(stderr, Stream::Stderr, document),
        );
        let status = child.wait().await;

        (out, err, status)
    }
}

#[async_trait]
impl Extractor for ProcessRunner {
    async fn run(&self, document: &DocumentRef, path: &Path) -> InvocationOutcome {
        self.run_reported(document, path).await.outcome
    }

    async fn run_reported(&self, document: &DocumentRef, path: &Path) -> InvocationReport {
        let started = Instant::now();
        let mut invocation = ExtractionInvocation::new(document.clone());

        // The caller normally verified the document; this is the fallback.
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!("[{}] File not found: {}", document, path.display());
            invocation.fail(InvocationError::DocumentNotFound {
                document: document.name().to_string(),
            });
            return invocation.into_report();
        }

        let mut child = match self.command(path).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("[{}] Failed to launch {}: {}", document, self.program, e);
                invocation.fail(InvocationError::LaunchFailed {
                    reason: format!("{}: {}", self.program, e),
                });
                return invocation.into_report();
            }
        };

        invocation.start(child.id());
        info!("[{}] Extractor started (pid {:?})", document, child.id());

        let drained = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, Self::drive(&mut child, document.name())).await {
                    Ok(drained) => drained,
                    Err(_) => {
                        if let Err(e) = child.kill().await {
                            warn!("[{}] Failed to kill timed out extractor: {}", document, e);
                        }
                        warn!("[{}] Extractor timed out after {:?}", document, limit);
                        invocation.record_exit(ExitState::Killed(None));
                        invocation.fail(InvocationError::Timeout {
                            millis: limit.as_millis() as u64,
                        });
                        return invocation.into_report();
                    }
                }
            }
            None => Self::drive(&mut child, document.name()).await,
        };

        let (out, err, status) = drained;
        invocation.append_stdout(&out.text);
        invocation.append_stderr(&err.text);
        for step in out.progress {
            invocation.record_progress(step);
        }
        if let Ok(status) = &status {
            invocation.record_exit(ExitState::from_status(*status));
        }

        match out.error.or(err.error).or(status.err()) {
            None => invocation.conclude(&self.marker),
            Some(e) => {
                warn!("[{}] Lost contact with extractor: {}", document, e);
                invocation.fail_unreadable(&e);
            }
        }

        info!(
            "[{}] Extractor finished: {:?} in {}ms",
            document,
            invocation.exit(),
            started.elapsed().as_millis()
        );

        invocation.into_report()
    }
}

/// Read one pipe to EOF, line by line, keeping every byte.
async fn pump<R>(reader: Option<R>, stream: Stream, document: &str) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let Some(reader) = reader else {
        return captured;
    };

    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                captured.text.push_str(&String::from_utf8_lossy(&line));
                captured.error = Some(e);
                break;
            }
        }

        let chunk = String::from_utf8_lossy(&line);
        let trimmed = chunk.trim_end_matches(['\n', '\r']);

        match stream {
            Stream::Stdout => {
                debug!("[{}] stdout: {}", document, trimmed);
                if let Some(step) = scraper::progress_step(trimmed) {
                    info!("[{}] Progress: {}", document, step);
                    captured.progress.push(step.to_string());
                }
            }
            Stream::Stderr => debug!("[{}] stderr: {}", document, trimmed),
        }

        captured.text.push_str(&chunk);
    }

    captured
}
