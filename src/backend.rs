//! Store selection from `[store].backend`.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;

use tracewriter_core::session::Session;
use tracewriter_core::store::SnapshotStore;

use crate::bridge::{LoadOutcome, PersistenceBridge};
use crate::config::Config;
use crate::http_store::HttpStore;
use crate::sqlite_store::SqliteStore;

/// Open the configured snapshot store.
pub async fn open_store(config: &Config) -> Result<Arc<dyn SnapshotStore>> {
    match config.store.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::open(config).await?)),
        "http" => {
            let url = config
                .store
                .url
                .as_deref()
                .context("store.url must be set when store.backend is 'http'")?;
            let timeout = Duration::from_secs(config.store.timeout_secs);
            Ok(Arc::new(HttpStore::new(url, timeout)?))
        }
        other => bail!("Unknown store backend: '{}'", other),
    }
}

/// One-line description of where state lives, for command output.
pub fn describe(config: &Config) -> String {
    match config.store.backend.as_str() {
        "http" => format!("http ({})", config.store.url.as_deref().unwrap_or("?")),
        other => format!("{} ({})", other, config.db.path.display()),
    }
}

/// Open the configured store and load a session from it.
///
/// A failed load leaves the session empty; the outcome is returned so the
/// caller can decide whether it is safe to go on.
pub async fn open_session(config: &Config) -> Result<(PersistenceBridge, Session, LoadOutcome)> {
    let store = open_store(config).await?;
    let bridge = PersistenceBridge::new(store, config.sync.debounce());
    let mut session = Session::new();
    let outcome = bridge.load_into(&mut session).await;
    Ok((bridge, session, outcome))
}

/// Like [`open_session`], but fails when the stored state could not be
/// loaded.
///
/// Used by commands that save or export. Every save overwrites the whole
/// stored document, so an empty stand-in session must never reach one.
pub async fn open_loaded_session(config: &Config) -> Result<(PersistenceBridge, Session)> {
    let (bridge, session, outcome) = open_session(config).await?;
    if outcome == LoadOutcome::Failed {
        bail!(
            "Could not load the stored state from {}; nothing was changed",
            describe(config)
        );
    }
    Ok((bridge, session))
}
