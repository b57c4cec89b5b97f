//! SQLite-backed [`SnapshotStore`].
//!
//! Stores the snapshot as two JSON text columns in the single-row `state`
//! table created by [`migrate::ensure_schema`](crate::migrate::ensure_schema).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use tracewriter_core::store::{SaveReceipt, Snapshot, SnapshotStore};

use crate::config::Config;
use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `[db].path` and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Time of the last save, or `None` if nothing was ever saved.
    pub async fn saved_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT saved_at FROM state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid saved_at in state table: {}", s))
        })
        .transpose()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn load(&self) -> Result<Snapshot> {
        let row = sqlx::query("SELECT properties_json, annotations_json FROM state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(Snapshot::default());
        };

        let properties_json: String = row.get("properties_json");
        let annotations_json: String = row.get("annotations_json");
        Ok(Snapshot {
            properties: serde_json::from_str(&properties_json)
                .context("Stored properties are not valid JSON")?,
            annotations: serde_json::from_str(&annotations_json)
                .context("Stored annotations are not valid JSON")?,
        })
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<SaveReceipt> {
        let saved_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO state (id, properties_json, annotations_json, saved_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                properties_json = excluded.properties_json,
                annotations_json = excluded.annotations_json,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(serde_json::to_string(&snapshot.properties)?)
        .bind(serde_json::to_string(&snapshot.annotations)?)
        .bind(saved_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(SaveReceipt { saved_at })
    }
}
