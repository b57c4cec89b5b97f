//! Export synthesis: hierarchy + annotation store → annotated export.
//!
//! Traverses properties → threads → emails in stored order with no
//! re-sorting or filtering. Each email gets `_annotation_after` set to the
//! trimmed annotation of the gap that follows it, or `null` when there is
//! none. The last email of every thread always gets `null`, even if the
//! store holds a stray entry at that index.
//!
//! Decoding the output with
//! [`decode_annotated_export`](crate::codec::decode_annotated_export) gives
//! back the same hierarchy and the store restricted to valid keys.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::annotations::{is_blank, AnnotationStore};
use crate::codec::wire_email;
use crate::models::{Hierarchy, Thread};
use crate::wire::{ExportMetadata, WireEmail, WireProperty, WireThread};

/// Attribution used when none is configured.
pub const DEFAULT_ANNOTATOR: &str = "team";

/// Provenance stamped on every exported property.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub annotator: String,
    pub annotated_at: DateTime<Utc>,
}

impl ExportOptions {
    /// Options stamped with the current time.
    pub fn now(annotator: impl Into<String>) -> Self {
        Self {
            annotator: annotator.into(),
            annotated_at: Utc::now(),
        }
    }

    fn metadata(&self) -> ExportMetadata {
        ExportMetadata {
            annotated_at: self
                .annotated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            annotator: self.annotator.clone(),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::now(DEFAULT_ANNOTATOR)
    }
}

/// Build the annotated export for `hierarchy` and `annotations`.
pub fn synthesize<'a>(
    hierarchy: &'a Hierarchy,
    annotations: &'a AnnotationStore,
    options: &ExportOptions,
) -> Vec<WireProperty<'a>> {
    let metadata = options.metadata();
    hierarchy
        .properties
        .iter()
        .map(|p| WireProperty {
            id: &p.id,
            subject: &p.subject,
            property: &p.property,
            thread_count: p.thread_count(),
            email_count: p.email_count(),
            threads: p
                .threads
                .iter()
                .map(|t| WireThread {
                    id: &t.id,
                    subject: &t.subject,
                    normalized_subject: &t.normalized_subject,
                    email_count: t.email_count(),
                    emails: annotated_emails(t, annotations),
                })
                .collect(),
            metadata: Some(metadata.clone()),
        })
        .collect()
}

fn annotated_emails<'a>(thread: &'a Thread, annotations: &'a AnnotationStore) -> Vec<WireEmail<'a>> {
    thread
        .emails
        .iter()
        .enumerate()
        .map(|(i, email)| {
            let text = if thread.has_gap(i) {
                annotations
                    .get(&thread.id, i)
                    .filter(|t| !is_blank(t))
                    .map(str::trim)
            } else {
                None
            };
            wire_email(email, Some(text))
        })
        .collect()
}

/// [`synthesize`] rendered as pretty-printed JSON.
pub fn synthesize_json(
    hierarchy: &Hierarchy,
    annotations: &AnnotationStore,
    options: &ExportOptions,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&synthesize(hierarchy, annotations, options))
}
