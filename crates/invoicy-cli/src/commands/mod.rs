//! Subcommands.

pub mod batch;
pub mod config;
pub mod process;
pub mod serve;

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use serde_json::Value;

use invoicy_core::models::config::InvoicyConfig;

/// Load configuration from `config_path`, else the default file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvoicyConfig> {
    let config = match config_path {
        Some(path) => InvoicyConfig::from_file(Path::new(path))?,
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                InvoicyConfig::from_file(&default_path)?
            } else {
                InvoicyConfig::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}

/// Serialize rendered output.
pub fn format_json(value: &Value, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Write rendered output to a file, or stdout when no file is given.
pub fn emit(output: &str, path: Option<&PathBuf>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, output)?;
            eprintln!(
                "{} Output written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", output),
    }
    Ok(())
}
