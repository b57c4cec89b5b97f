//! `tw annotate`: set gap annotations on one thread.
//!
//! Each `--gap` is applied as a separate edit and submitted to the saver,
//! exactly as an interactive editor would; the debounce collapses the burst
//! into a single save.

use anyhow::Result;
use tracing::warn;

use crate::backend;
use crate::config::Config;

pub async fn run_annotate(config: &Config, thread_id: &str, gaps: Vec<(usize, String)>) -> Result<()> {
    if gaps.is_empty() {
        anyhow::bail!("Nothing to do: pass at least one --gap INDEX=TEXT");
    }

    let (bridge, mut session) = backend::open_loaded_session(config).await?;

    match session.hierarchy().find_thread(thread_id) {
        None => warn!(thread = thread_id, "thread not found; annotations will not be exported"),
        Some(thread) => {
            for (index, _) in &gaps {
                if !thread.has_gap(*index) {
                    warn!(
                        thread = thread_id,
                        index,
                        gaps = thread.gap_count(),
                        "no such gap; the annotation will not be exported"
                    );
                }
            }
        }
    }

    let saver = bridge.spawn_saver();
    let count = gaps.len();
    for (index, text) in gaps {
        session.annotate(thread_id, index, text);
        saver.submit_session(&session)?;
    }
    let stats = saver.close().await?;
    if stats.saves_failed > 0 {
        anyhow::bail!(
            "Annotations were not saved to {}",
            backend::describe(config)
        );
    }

    match session.thread_progress(thread_id) {
        Some(progress) => println!(
            "Annotated {} gap(s) in {} ({} / {} gaps annotated)",
            count, thread_id, progress.annotated, progress.gaps
        ),
        None => println!("Annotated {} gap(s) in {}", count, thread_id),
    }

    Ok(())
}
