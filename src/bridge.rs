//! Persistence bridge: keeps a [`SnapshotStore`] eventually consistent with
//! a local [`Session`] without blocking edits.
//!
//! - [`PersistenceBridge::load_into`] does the single read at session start.
//! - [`PersistenceBridge::spawn_saver`] starts a background task that
//!   receives snapshots after every mutation and saves them through a
//!   [`SaveScheduler`]: bursts are debounced, at most one save is in flight,
//!   and a failed save is logged and left for the next edit to retry.
//!
//! The session itself never waits on the network; submitting a snapshot is
//! a channel send.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tracewriter_core::session::Session;
use tracewriter_core::store::{SaveReceipt, Snapshot, SnapshotStore};
use tracewriter_core::sync::SaveScheduler;

/// What [`PersistenceBridge::load_into`] did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Stored state replaced the session.
    Restored { properties: usize, annotations: usize },
    /// Nothing saved yet; the session is unchanged.
    Empty,
    /// The read or decode failed; the session is unchanged.
    Failed,
}

/// Counters returned when the saver shuts down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub saves_attempted: usize,
    pub saves_failed: usize,
    pub last_saved_at: Option<DateTime<Utc>>,
}

pub struct PersistenceBridge {
    store: Arc<dyn SnapshotStore>,
    debounce: Duration,
}

impl PersistenceBridge {
    pub fn new(store: Arc<dyn SnapshotStore>, debounce: Duration) -> Self {
        Self { store, debounce }
    }

    /// Read the stored snapshot and, if it holds a non-empty hierarchy that
    /// decodes, replace the session with it (cursor reset included).
    ///
    /// Never fails: problems are logged and the session is left alone.
    pub async fn load_into(&self, session: &mut Session) -> LoadOutcome {
        let snapshot = match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(%error, "could not load saved state; continuing with local state");
                return LoadOutcome::Failed;
            }
        };

        if snapshot.is_empty() {
            debug!("no saved state");
            return LoadOutcome::Empty;
        }

        match snapshot.decode() {
            Ok(restored) => {
                if !restored.rejected_keys.is_empty() {
                    warn!(
                        count = restored.rejected_keys.len(),
                        "skipped malformed annotation keys in saved state"
                    );
                }
                let outcome = LoadOutcome::Restored {
                    properties: restored.hierarchy.property_count(),
                    annotations: restored.annotations.len(),
                };
                session.replace(restored.hierarchy, restored.annotations);
                info!(?outcome, "loaded saved state");
                outcome
            }
            Err(e) => {
                warn!(error = %e, "saved state does not decode; ignoring it");
                LoadOutcome::Failed
            }
        }
    }

    /// Start the background saver.
    pub fn spawn_saver(&self) -> SaverHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_saver(self.store.clone(), rx, self.debounce));
        SaverHandle { tx, task }
    }
}

enum SaverMsg {
    Snapshot(Snapshot),
    Close,
}

/// Sending side of a running saver.
pub struct SaverHandle {
    tx: mpsc::UnboundedSender<SaverMsg>,
    task: JoinHandle<SaveStats>,
}

impl SaverHandle {
    /// Record a mutation. Only the most recent snapshot is ever saved.
    pub fn submit(&self, snapshot: Snapshot) -> Result<()> {
        self.tx
            .send(SaverMsg::Snapshot(snapshot))
            .map_err(|_| anyhow!("saver task is no longer running"))
    }

    pub fn submit_session(&self, session: &Session) -> Result<()> {
        let snapshot = Snapshot::from_session(session).context("Failed to snapshot session")?;
        self.submit(snapshot)
    }

    /// Flush any pending save, wait for the in-flight one, and stop.
    pub async fn close(self) -> Result<SaveStats> {
        // The task also stops if the channel is already closed.
        let _ = self.tx.send(SaverMsg::Close);
        self.task.await.context("saver task panicked")
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

async fn join_in_flight(
    task: &mut Option<JoinHandle<Result<SaveReceipt>>>,
) -> Result<Result<SaveReceipt>, tokio::task::JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn run_saver(
    store: Arc<dyn SnapshotStore>,
    mut rx: mpsc::UnboundedReceiver<SaverMsg>,
    debounce: Duration,
) -> SaveStats {
    let mut scheduler = SaveScheduler::new(debounce);
    let mut latest: Option<Snapshot> = None;
    let mut in_flight: Option<JoinHandle<Result<SaveReceipt>>> = None;
    let mut closing = false;
    let mut stats = SaveStats::default();

    loop {
        if closing {
            scheduler.flush(now());
            if scheduler.is_idle() && in_flight.is_none() {
                break;
            }
        }

        let deadline = scheduler.next_deadline();
        tokio::select! {
            msg = rx.recv(), if !closing => match msg {
                Some(SaverMsg::Snapshot(snapshot)) => {
                    if in_flight.is_some() {
                        debug!("save in flight; coalescing edit");
                    }
                    latest = Some(snapshot);
                    scheduler.on_edit(now());
                }
                Some(SaverMsg::Close) | None => closing = true,
            },
            _ = sleep_until(deadline) => {
                if scheduler.on_timer(now()) {
                    match latest.take() {
                        Some(snapshot) => {
                            stats.saves_attempted += 1;
                            let store = store.clone();
                            in_flight = Some(tokio::spawn(async move { store.save(&snapshot).await }));
                        }
                        None => scheduler.on_response(now()),
                    }
                }
            }
            result = join_in_flight(&mut in_flight) => {
                in_flight = None;
                match result {
                    Ok(Ok(receipt)) => {
                        debug!(saved_at = %receipt.saved_at, "saved");
                        stats.last_saved_at = Some(receipt.saved_at);
                    }
                    Ok(Err(e)) => {
                        stats.saves_failed += 1;
                        let error = format!("{:#}", e);
                        warn!(%error, "save failed; the next edit will try again");
                    }
                    Err(e) => {
                        stats.saves_failed += 1;
                        warn!(error = %e, "save task aborted");
                    }
                }
                scheduler.on_response(now());
            }
        }
    }

    stats
}
