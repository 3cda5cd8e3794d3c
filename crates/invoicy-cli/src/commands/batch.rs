//! Batch processing command for several uploaded documents.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use invoicy_core::{BatchResult, DocumentRef, Presenter, coordinator_from_config};

use super::{emit, format_json, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Document names inside the uploads directory
    names: Vec<String>,

    /// Glob pattern matched inside the uploads directory (e.g. "*.pdf")
    #[arg(long)]
    pattern: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write a per-document summary CSV
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Number of parallel extractor processes (default: from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Uploads directory (overrides config)
    #[arg(short, long)]
    uploads_dir: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Exit with an error if any document failed
    #[arg(long)]
    strict: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.uploads_dir.clone() {
        config.store.uploads_dir = dir;
    }
    if let Some(jobs) = args.jobs {
        config.batch.concurrency_limit = jobs;
    }
    let jobs = config.batch.concurrency_limit;

    let mut names = args.names.clone();
    if let Some(pattern) = &args.pattern {
        names.extend(expand_pattern(&config.store.uploads_dir, pattern)?);
    }

    if names.is_empty() {
        anyhow::bail!("No documents given. Pass document names or --pattern.");
    }

    eprintln!(
        "{} Processing {} documents with {} parallel extractors",
        style("ℹ").blue(),
        names.len(),
        jobs
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Extracting {} documents...", names.len()));
    pb.enable_steady_tick(Duration::from_millis(120));

    let coordinator = coordinator_from_config(&config)?;
    let documents: Vec<DocumentRef> = names.into_iter().map(DocumentRef::new).collect();
    let result = coordinator.process_batch(documents, jobs).await?;

    pb.finish_and_clear();

    let presenter = Presenter::new(&config.server.uploads_base_url);
    let output = format_json(&presenter.present_batch(&result), args.pretty)?;
    emit(&output, args.output.as_ref())?;

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &result)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_summary(&result);

    if args.strict && result.failed() > 0 {
        anyhow::bail!("{} of {} documents failed", result.failed(), result.len());
    }

    Ok(())
}

/// Names of files in `uploads_dir` matching `pattern`.
fn expand_pattern(uploads_dir: &Path, pattern: &str) -> anyhow::Result<Vec<String>> {
    let full = uploads_dir.join(pattern);
    let names: Vec<String> = glob(&full.to_string_lossy())?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();

    debug!("Pattern {} matched {} documents", pattern, names.len());
    Ok(names)
}

fn print_summary(result: &BatchResult) {
    eprintln!();
    eprintln!(
        "{} Processed {} documents in {}ms",
        style("✓").green(),
        result.len(),
        result.duration_ms()
    );
    eprintln!(
        "   {} successful, {} failed",
        style(result.succeeded()).green(),
        style(result.failed()).red()
    );

    if result.failed() > 0 {
        eprintln!();
        eprintln!("{}", style("Failed documents:").red());
        for entry in result {
            if let Some(error) = entry.error() {
                eprintln!("  - {}: {}", entry.document, error);
            }
        }
    }
}

fn write_summary(path: &Path, result: &BatchResult) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(["document", "status", "error_kind", "elapsed_ms", "details"])?;

    for entry in result {
        let elapsed = entry.elapsed_ms.to_string();
        match entry.error() {
            None => wtr.write_record([entry.document.name(), "success", "", &elapsed, ""])?,
            Some(error) => wtr.write_record([
                entry.document.name(),
                "error",
                error.kind(),
                &elapsed,
                &error.to_string(),
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_expand_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"b").unwrap();
        std::fs::write(dir.path().join("c.png"), b"c").unwrap();
        std::fs::create_dir(dir.path().join("d.pdf")).unwrap();

        let names = expand_pattern(dir.path(), "*.pdf").unwrap();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_write_summary() {
        use invoicy_core::{BatchEntry, ExtractedPayload, InvocationError};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let result = BatchResult::new(
            vec![
                BatchEntry::new(
                    DocumentRef::new("a.pdf"),
                    Ok(ExtractedPayload::new(serde_json::json!({}))),
                    10,
                ),
                BatchEntry::new(
                    DocumentRef::new("b.pdf"),
                    Err(InvocationError::NoMarkerFound),
                    7,
                ),
            ],
            Utc::now(),
            Utc::now(),
        );

        write_summary(&path, &result).unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "document,status,error_kind,elapsed_ms,details");
        assert_eq!(lines[1], "a.pdf,success,,10,");
        assert_eq!(
            lines[2],
            "b.pdf,error,no_marker_found,7,no output data found in extractor output"
        );
    }
}
