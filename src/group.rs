//! `tw group`: turn an ungrouped archive into the preprocessed shape.
//!
//! Input is one record per property with a flat `emails` list; output is
//! properties → threads → emails with counts filled in, ready for
//! `tw import`. Works without a database.

use anyhow::{Context, Result};
use std::path::Path;

use tracewriter_core::codec::{encode_preprocessed, parse_json};
use tracewriter_core::grouping::group_archive;

pub fn run_group(input: &Path, output: Option<&Path>, min_emails: usize) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let doc = parse_json(&bytes).with_context(|| format!("Failed to parse {}", input.display()))?;
    let grouped = group_archive(&doc, min_emails)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let hierarchy = &grouped.hierarchy;
    let json = serde_json::to_string_pretty(&encode_preprocessed(hierarchy))?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{}", json),
    }

    eprintln!(
        "Grouped {} emails into {} threads across {} properties",
        hierarchy.email_count(),
        hierarchy.thread_count(),
        hierarchy.property_count()
    );
    if !grouped.skipped.is_empty() {
        eprintln!(
            "Skipped {} properties with fewer than {} emails: {}",
            grouped.skipped.len(),
            min_emails,
            grouped.skipped.join(", ")
        );
    }

    Ok(())
}
