//! HTTP client for a remote state endpoint (`tw serve` or compatible).
//!
//! `GET <url>` returns the snapshot; `POST <url>` overwrites it and answers
//! `{success, savedAt}`. No retries here: the save scheduler owns that
//! policy, and it never retries.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use tracewriter_core::store::{SaveReceipt, Snapshot, SnapshotStore};

use crate::server::SaveResponse;

pub struct HttpStore {
    client: reqwest::Client,
    url: String,
}

impl HttpStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotStore for HttpStore {
    async fn load(&self) -> Result<Snapshot> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("State endpoint error {}: {}", status, body_text);
        }

        response
            .json::<Snapshot>()
            .await
            .context("State endpoint returned an invalid snapshot")
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<SaveReceipt> {
        let response = self
            .client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("State endpoint error {}: {}", status, body_text);
        }

        let ack: SaveResponse = response
            .json()
            .await
            .context("State endpoint returned an invalid save response")?;
        if !ack.success {
            bail!("State endpoint did not accept the save");
        }
        Ok(SaveReceipt {
            saved_at: ack.saved_at,
        })
    }
}
