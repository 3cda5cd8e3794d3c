//! Process command - run the extractor over one uploaded document.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use invoicy_core::{DocumentRef, Presenter, coordinator_from_config};

use super::{emit, format_json, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Document name inside the uploads directory
    #[arg(required = true)]
    name: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Uploads directory (overrides config)
    #[arg(short, long)]
    uploads_dir: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(dir) = args.uploads_dir {
        config.store.uploads_dir = dir;
    }

    info!("Processing file: {}", args.name);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Extracting {}...", args.name));
    pb.enable_steady_tick(Duration::from_millis(120));

    let coordinator = coordinator_from_config(&config)?;
    let entry = coordinator
        .process_one(DocumentRef::new(args.name.clone()))
        .await?;

    pb.finish_and_clear();

    for step in &entry.progress {
        eprintln!("  {} {}", style("·").dim(), step);
    }

    let presenter = Presenter::new(&config.server.uploads_base_url);
    let output = format_json(&presenter.present_entry(&entry), args.pretty)?;
    emit(&output, args.output.as_ref())?;

    debug!("Total processing time: {:?}", start.elapsed());

    if let Some(error) = entry.error() {
        eprintln!("{} {}: {}", style("✗").red(), args.name, error);
        anyhow::bail!("Processing failed ({})", error.kind());
    }

    eprintln!(
        "{} Processed {} in {}ms",
        style("✓").green(),
        args.name,
        entry.elapsed_ms
    );

    Ok(())
}
