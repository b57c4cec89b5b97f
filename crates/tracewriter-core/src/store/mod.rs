//! Storage abstraction for session snapshots.
//!
//! The [`SnapshotStore`] trait is the contract between a session and its
//! durable copy: one whole-document read, one whole-document overwrite.
//! There is no partial or field-level merge; the last save wins.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::annotations::AnnotationStore;
use crate::codec::{decode_preprocessed, encode_preprocessed};
use crate::error::ParseError;
use crate::models::Hierarchy;
use crate::session::Session;

/// The persisted form of a session.
///
/// `properties` holds the hierarchy in the preprocessed shape; annotations
/// travel separately, keyed `"<thread-id>:<index>"`. The default value is
/// what a store returns when nothing has been saved yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub properties: Vec<Value>,
    pub annotations: BTreeMap<String, String>,
}

/// Acknowledgement of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReceipt {
    pub saved_at: DateTime<Utc>,
}

/// A snapshot decoded back into session values.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredState {
    pub hierarchy: Hierarchy,
    pub annotations: AnnotationStore,
    /// Annotation keys that did not parse as `<thread-id>:<index>`.
    pub rejected_keys: Vec<String>,
}

impl Snapshot {
    pub fn capture(hierarchy: &Hierarchy, annotations: &AnnotationStore) -> serde_json::Result<Self> {
        let properties = encode_preprocessed(hierarchy)
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self {
            properties,
            annotations: annotations.to_wire(),
        })
    }

    pub fn from_session(session: &Session) -> serde_json::Result<Self> {
        Self::capture(session.hierarchy(), session.annotations())
    }

    /// `true` when there is no hierarchy to restore.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn decode(self) -> Result<RestoredState, ParseError> {
        let hierarchy = decode_preprocessed(&Value::Array(self.properties))?;
        let (annotations, rejected_keys) = AnnotationStore::from_wire(self.annotations);
        Ok(RestoredState {
            hierarchy,
            annotations,
            rejected_keys,
        })
    }
}

/// Durable home of a session snapshot.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](SnapshotStore::load) | Read the stored snapshot, or the empty default |
/// | [`save`](SnapshotStore::save) | Overwrite the stored snapshot |
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the current snapshot. Never-saved is not an error: it returns
    /// [`Snapshot::default`].
    async fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot and return the store-assigned save time.
    async fn save(&self, snapshot: &Snapshot) -> Result<SaveReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{property, thread};

    #[test]
    fn test_capture_and_decode() {
        let h = Hierarchy::new(vec![property("p", vec![thread("t", 3)])]);
        let mut a = AnnotationStore::new();
        a.set("t", 1, "sent disclosures");
        a.set("t", 7, "stray keys are persisted too");

        let snap = Snapshot::capture(&h, &a).unwrap();
        assert_eq!(snap.properties[0]["threads"][0]["email_count"], 3);
        assert!(snap.properties[0]["threads"][0]["emails"][0]
            .get("_annotation_after")
            .is_none());
        assert_eq!(snap.annotations.get("t:1").map(String::as_str), Some("sent disclosures"));

        let restored = snap.decode().unwrap();
        assert_eq!(restored.hierarchy, h);
        assert_eq!(restored.annotations, a);
        assert!(restored.rejected_keys.is_empty());
    }

    #[test]
    fn test_default_is_empty_wire_shape() {
        let snap = Snapshot::default();
        assert!(snap.is_empty());
        assert_eq!(
            serde_json::to_value(&snap).unwrap(),
            serde_json::json!({"properties": [], "annotations": {}})
        );
    }

    #[test]
    fn test_receipt_wire_name() {
        let receipt: SaveReceipt =
            serde_json::from_str(r#"{"savedAt": "2024-03-01T12:00:00Z"}"#).unwrap();
        assert_eq!(
            serde_json::to_value(receipt).unwrap()["savedAt"],
            "2024-03-01T12:00:00Z"
        );
    }

    #[test]
    fn test_decode_reports_bad_properties() {
        let snap = Snapshot {
            properties: vec![serde_json::json!({"id": "p"})],
            annotations: BTreeMap::new(),
        };
        let err = snap.decode().unwrap_err();
        assert_eq!(err.path(), Some("$[0]"));
    }
}
