//! Session statistics and annotation progress.
//!
//! Used by `tw stats` to show what is loaded and how much of it has been
//! annotated. Progress counts only gaps that exist and hold non-blank text.

use anyhow::Result;
use std::fmt::Write;

use tracewriter_core::session::Session;

use crate::backend;
use crate::bridge::LoadOutcome;
use crate::config::Config;

/// Render totals and the per-thread progress table.
pub fn render_stats(session: &Session) -> String {
    let p = session.progress();
    let mut out = String::new();

    let _ = writeln!(out, "  Properties:  {}", p.properties);
    let _ = writeln!(out, "  Threads:     {}", p.threads);
    let _ = writeln!(out, "  Emails:      {}", p.emails);
    let _ = writeln!(
        out,
        "  Annotated:   {} / {} gaps ({}%)",
        p.annotated,
        p.gaps,
        if p.gaps > 0 { (p.annotated * 100) / p.gaps } else { 0 }
    );

    let threads = session.thread_progress_all();
    if !threads.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  By thread:");
        let _ = writeln!(
            out,
            "  {:<32} {:>6} {:>11}   {}",
            "THREAD", "EMAILS", "ANNOTATED", "SUBJECT"
        );
        let _ = writeln!(out, "  {}", "-".repeat(76));
        for t in &threads {
            let _ = writeln!(
                out,
                "  {:<32} {:>6} {:>11}   {}",
                t.thread_id,
                t.emails,
                format!("{} / {}", t.annotated, t.gaps),
                t.subject
            );
        }
    }

    out
}

/// Run the stats command: load the stored session and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let (_bridge, session, outcome) = backend::open_session(config).await?;

    println!("TraceWriter Session Stats");
    println!("=========================");
    println!();
    println!("  Store:       {}", backend::describe(config));
    if outcome == LoadOutcome::Failed {
        println!("  State:       could not be loaded (showing an empty session)");
    }
    if config.store.backend == "sqlite" {
        let db_size = std::fs::metadata(&config.db.path)
            .map(|m| m.len())
            .unwrap_or(0);
        println!("  Size:        {}", format_bytes(db_size));
    }
    println!();
    print!("{}", render_stats(&session));
    println!();

    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
