//! Configuration structures for the orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{InvoicyError, Result};

/// Main configuration for invoicy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoicyConfig {
    /// Document store configuration.
    pub store: StoreConfig,

    /// External extractor configuration.
    pub extractor: ExtractorConfig,

    /// Batch coordination configuration.
    pub batch: BatchConfig,

    /// HTTP server configuration.
    pub server: ServerConfig,
}

/// Where uploaded documents live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding uploaded files by name.
    pub uploads_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

/// How to launch the external extraction tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Program to execute.
    pub program: String,

    /// Arguments placed before the document path.
    pub args: Vec<String>,

    /// Working directory for the extractor process.
    pub working_dir: Option<PathBuf>,

    /// Prefix of the stdout line carrying the JSON result.
    pub marker: String,

    /// Per-invocation deadline in seconds (unset = no deadline).
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["d2.py".to_string()],
            working_dir: None,
            marker: crate::scraper::DEFAULT_MARKER.to_string(),
            timeout_secs: None,
        }
    }
}

impl ExtractorConfig {
    /// Deadline as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Batch coordination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of extractor processes running at once.
    pub concurrency_limit: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
        }
    }
}

/// HTTP front end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: String,

    /// Public URL under which the uploads directory is served.
    /// Used to turn extractor image paths into links.
    pub uploads_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            uploads_base_url: "http://127.0.0.1:5000/uploads".to_string(),
        }
    }
}

impl InvoicyConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> std::result::Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch.concurrency_limit == 0 {
            return Err(InvoicyError::Config(
                "batch.concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.extractor.program.trim().is_empty() {
            return Err(InvoicyError::Config(
                "extractor.program must not be empty".to_string(),
            ));
        }
        if self.extractor.marker.is_empty() {
            return Err(InvoicyError::Config(
                "extractor.marker must not be empty".to_string(),
            ));
        }
        if self.extractor.timeout_secs == Some(0) {
            return Err(InvoicyError::Config(
                "extractor.timeout_secs must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
