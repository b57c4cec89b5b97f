//! `tw export`: write the annotated export of the stored session.
//!
//! Writes to a file when `--output` is given, otherwise to stdout for
//! piping. The summary line goes to stderr.

use anyhow::{Context, Result};
use std::path::Path;

use tracewriter_core::export::ExportOptions;

use crate::backend;
use crate::config::Config;

pub async fn run_export(
    config: &Config,
    output: Option<&Path>,
    annotator: Option<String>,
) -> Result<()> {
    let annotator = annotator.unwrap_or_else(|| config.export.annotator.clone());
    if annotator.trim().is_empty() {
        anyhow::bail!("--annotator must not be empty");
    }

    let (_bridge, session) = backend::open_loaded_session(config).await?;
    let options = ExportOptions::now(annotator);
    let json = serde_json::to_string_pretty(&session.export(&options))?;
    let progress = session.progress();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} properties, {} threads, {} / {} gaps annotated to {}",
                progress.properties,
                progress.threads,
                progress.annotated,
                progress.gaps,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
