//! Configuration parsing and validation.
//!
//! TraceWriter is configured via a TOML file (default: `config/tw.toml`).
//! Only `[db]` is required; every other section falls back to the defaults
//! below.
//!
//! ```toml
//! [db]
//! path = "./data/tracewriter.sqlite"
//!
//! [store]
//! backend = "sqlite"        # "sqlite" | "http"
//! url = "http://127.0.0.1:7340/api/state"
//! timeout_secs = 30
//!
//! [sync]
//! debounce_ms = 2000
//!
//! [export]
//! annotator = "team"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [grouping]
//! min_emails = 0
//! ```
//!
//! Validation happens in [`load_config`]: an unknown store backend, an
//! `http` backend without a `url`, a zero debounce or timeout, and a blank
//! annotator are all rejected.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file. Parent directories are created.
    pub path: PathBuf,
}

/// Where session snapshots are persisted.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `sqlite` (the `[db]` file) or `http` (a remote `tw serve`).
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Full URL of the remote state endpoint. Required for `http`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Quiescence window before a save is sent, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    /// Attribution label stamped into `_metadata.annotator`.
    #[serde(default = "default_annotator")]
    pub annotator: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            annotator: default_annotator(),
        }
    }
}

fn default_annotator() -> String {
    tracewriter_core::export::DEFAULT_ANNOTATOR.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GroupingConfig {
    /// Properties with fewer emails than this are dropped by `tw group`.
    #[serde(default)]
    pub min_emails: usize,
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/tracewriter.sqlite"),
            },
            store: StoreConfig::default(),
            sync: SyncConfig::default(),
            export: ExportConfig::default(),
            server: ServerConfig::default(),
            grouping: GroupingConfig::default(),
        }
    }
}

/// Read, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "sqlite" => {}
        "http" => {
            let has_url = config
                .store
                .url
                .as_deref()
                .is_some_and(|u| !u.trim().is_empty());
            if !has_url {
                anyhow::bail!("store.url must be set when store.backend is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be sqlite or http.",
            other
        ),
    }

    if config.store.timeout_secs == 0 {
        anyhow::bail!("store.timeout_secs must be > 0");
    }

    if config.sync.debounce_ms == 0 {
        anyhow::bail!("sync.debounce_ms must be > 0");
    }

    if config.export.annotator.trim().is_empty() {
        anyhow::bail!("export.annotator must not be empty");
    }

    Ok(())
}
