//! Serialized forms of the hierarchy.
//!
//! One borrowed set of structs covers both outgoing shapes: the
//! preprocessed shape leaves `_annotation_after` and `_metadata` out
//! entirely, the annotated export sets them on every email and property.
//! Field order here is the field order on the wire.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WireProperty<'a> {
    pub id: &'a str,
    pub subject: &'a str,
    pub property: &'a str,
    pub thread_count: usize,
    pub email_count: usize,
    pub threads: Vec<WireThread<'a>>,
    #[serde(rename = "_metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExportMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireThread<'a> {
    pub id: &'a str,
    pub subject: &'a str,
    pub normalized_subject: &'a str,
    pub email_count: usize,
    pub emails: Vec<WireEmail<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireEmail<'a> {
    pub id: &'a str,
    pub from: &'a str,
    pub to: Option<&'a str>,
    pub date: Option<&'a str>,
    #[serde(rename = "dateDisplay")]
    pub date_display: &'a str,
    pub subject: Option<&'a str>,
    pub body: &'a str,
    /// `None` omits the key; `Some(None)` writes an explicit `null`.
    #[serde(rename = "_annotation_after", skip_serializing_if = "Option::is_none")]
    pub annotation_after: Option<Option<&'a str>>,
}

/// Provenance attached to every property of an annotated export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMetadata {
    /// ISO-8601 synthesis time.
    pub annotated_at: String,
    pub annotator: String,
}
