//! `tw import` and `tw detect`.
//!
//! Import decodes the whole document before touching anything: a malformed
//! file fails with the JSON path of the offending node and the stored state
//! is left as it was.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

use tracewriter_core::codec::{decode_document, detect_shape, parse_json, Shape};

use crate::backend;
use crate::config::Config;

fn read_document(file: &Path) -> Result<Value> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    parse_json(&bytes).with_context(|| format!("Failed to parse {}", file.display()))
}

/// Print the shape of a document: `preprocessed` or `annotated`.
pub fn run_detect(file: &Path) -> Result<()> {
    let doc = read_document(file)?;
    println!("{}", detect_shape(&doc).as_str());
    Ok(())
}

/// Import a document of either shape into the stored session.
pub async fn run_import(config: &Config, file: &Path) -> Result<()> {
    let doc = read_document(file)?;
    let decoded =
        decode_document(&doc).with_context(|| format!("Failed to decode {}", file.display()))?;

    let (bridge, mut session) = backend::open_loaded_session(config).await?;
    let summary = session.apply_import(decoded);

    let saver = bridge.spawn_saver();
    saver.submit_session(&session)?;
    let stats = saver.close().await?;
    if stats.saves_failed > 0 {
        bail!(
            "Imported {} but the result could not be saved to {}",
            file.display(),
            backend::describe(config)
        );
    }

    println!("Imported {} ({} shape)", file.display(), summary.shape.as_str());
    println!("  properties:  {}", summary.properties);
    println!("  threads:     {}", summary.threads);
    println!("  emails:      {}", summary.emails);
    if summary.shape == Shape::AnnotatedExport {
        println!("  annotations: {} merged", summary.imported_annotations);
    }
    let progress = session.progress();
    println!("  progress:    {} / {} gaps annotated", progress.annotated, progress.gaps);

    Ok(())
}
