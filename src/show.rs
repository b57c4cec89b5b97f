//! `tw show`: print one thread with its gap annotations.

use anyhow::{bail, Result};
use std::fmt::Write;

use tracewriter_core::annotations::is_blank;
use tracewriter_core::session::Session;

use crate::backend;
use crate::config::Config;

/// Render a thread as plain text, or `None` if the session has no such
/// thread.
///
/// Each email is followed by the annotation of the gap after it, except the
/// last, which has no gap.
pub fn render_thread(session: &Session, thread_id: &str) -> Option<String> {
    let (property, thread) = session
        .hierarchy()
        .threads()
        .find(|(_, t)| t.id == thread_id)?;
    let progress = session.thread_progress(thread_id)?;

    let mut out = String::new();
    let _ = writeln!(out, "Thread:    {}", thread.id);
    let _ = writeln!(out, "Subject:   {}", thread.subject);
    let _ = writeln!(out, "Property:  {} ({})", property.id, property.subject);
    let _ = writeln!(
        out,
        "Progress:  {} / {} gaps annotated",
        progress.annotated, progress.gaps
    );

    for (i, email) in thread.emails.iter().enumerate() {
        let _ = writeln!(out);
        let to = email
            .recipient
            .as_deref()
            .map(|r| format!(" -> {}", r))
            .unwrap_or_default();
        let _ = writeln!(out, "[{}] {}  {}{}", i, email.display_timestamp, email.sender, to);
        if let Some(subject) = &email.subject {
            let _ = writeln!(out, "    Subject: {}", subject);
        }
        for line in email.body.lines() {
            let _ = writeln!(out, "    {}", line);
        }

        if thread.has_gap(i) {
            let note = session
                .annotations()
                .get(&thread.id, i)
                .filter(|t| !is_blank(t))
                .map(str::trim)
                .unwrap_or("(not annotated)");
            let _ = writeln!(out, "  -- gap {}: {}", i, note);
        }
    }

    Some(out)
}

pub async fn run_show(config: &Config, thread_id: &str) -> Result<()> {
    let (_bridge, session, _) = backend::open_session(config).await?;
    match render_thread(&session, thread_id) {
        Some(text) => {
            print!("{}", text);
            Ok(())
        }
        None => bail!("No thread with id: {}", thread_id),
    }
}
