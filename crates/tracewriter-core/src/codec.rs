//! JSON codec for the two import shapes.
//!
//! - **Preprocessed** (shape A): the normalizer's output. An ordered list of
//!   properties → threads → emails, with the email fields renamed on the
//!   wire (`from`, `to`, `date`, `dateDisplay`).
//! - **Annotated export** (shape B): the same nesting, where each email also
//!   carries `_annotation_after`, the text of the gap that follows it. A
//!   legacy flat variant (a bare list of threads) is lifted into a single
//!   synthetic property.
//!
//! Decoding walks a parsed [`serde_json::Value`] so that every failure can
//! name the path of the offending node. Decode is all-or-nothing: it only
//! builds new values and returns them on success.
//!
//! # Shape detection
//!
//! A document is an annotated export iff at least one email anywhere carries
//! the `_annotation_after` key, whatever its value. [`detect_shape`] is
//! total: it never fails and never mutates the document.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::annotations::{is_blank, AnnotationStore};
use crate::error::ParseError;
use crate::grouping::normalize_subject;
use crate::models::{Email, Hierarchy, Property, Thread};
use crate::wire::{WireEmail, WireProperty, WireThread};

/// Per-email key holding the annotation of the following gap.
pub const ANNOTATION_FIELD: &str = "_annotation_after";

/// Identifier of the property a legacy flat export is lifted into.
pub const LEGACY_PROPERTY_ID: &str = "legacy_import";

/// Subject of the property a legacy flat export is lifted into.
pub const LEGACY_PROPERTY_SUBJECT: &str = "Imported threads";

/// Display timestamp used when an email has no date.
pub const UNKNOWN_DATE: &str = "Unknown date";

const DISPLAY_FORMAT: &str = "%b %d, %I:%M %p";

/// The two document variants the codec accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Preprocessed,
    AnnotatedExport,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Preprocessed => "preprocessed",
            Shape::AnnotatedExport => "annotated",
        }
    }
}

/// Result of decoding a document of either shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportDocument {
    Preprocessed(Hierarchy),
    AnnotatedExport {
        hierarchy: Hierarchy,
        annotations: AnnotationStore,
    },
}

impl ImportDocument {
    pub fn shape(&self) -> Shape {
        match self {
            ImportDocument::Preprocessed(_) => Shape::Preprocessed,
            ImportDocument::AnnotatedExport { .. } => Shape::AnnotatedExport,
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        match self {
            ImportDocument::Preprocessed(h) => h,
            ImportDocument::AnnotatedExport { hierarchy, .. } => hierarchy,
        }
    }
}

/// Parse raw bytes into a JSON document.
pub fn parse_json(bytes: &[u8]) -> Result<Value, ParseError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Classify a document. Never fails.
pub fn detect_shape(doc: &Value) -> Shape {
    if has_annotation_field(doc) {
        Shape::AnnotatedExport
    } else {
        Shape::Preprocessed
    }
}

/// Whether any email in `doc` carries [`ANNOTATION_FIELD`], even as `null`.
///
/// Looks at `properties[].threads[].emails[]` and, for the legacy flat
/// variant, `threads[].emails[]`. Anything that does not fit either nesting
/// is skipped rather than reported.
pub fn has_annotation_field(doc: &Value) -> bool {
    let items: &[Value] = match doc {
        Value::Array(items) => items,
        Value::Object(_) => std::slice::from_ref(doc),
        _ => return false,
    };

    fn emails_have_field(thread: &Value) -> bool {
        thread
            .get("emails")
            .and_then(Value::as_array)
            .is_some_and(|emails| {
                emails
                    .iter()
                    .any(|e| e.as_object().is_some_and(|o| o.contains_key(ANNOTATION_FIELD)))
            })
    }

    items.iter().any(|item| match item.get("threads") {
        Some(Value::Array(threads)) => threads.iter().any(emails_have_field),
        Some(_) => false,
        None => emails_have_field(item),
    })
}

/// Decode either shape, probing for the annotation field first.
pub fn decode_document(doc: &Value) -> Result<ImportDocument, ParseError> {
    match detect_shape(doc) {
        Shape::AnnotatedExport => {
            let (hierarchy, annotations) = decode_annotated_export(doc)?;
            Ok(ImportDocument::AnnotatedExport {
                hierarchy,
                annotations,
            })
        }
        Shape::Preprocessed => Ok(ImportDocument::Preprocessed(decode_preprocessed(doc)?)),
    }
}

/// Decode a preprocessed (shape A) document.
///
/// A single top-level object is treated as a one-element list. Property and
/// thread ids are required; a missing email id falls back to `msg_<index>`
/// (position within its thread). Any annotation fields are ignored.
pub fn decode_preprocessed(doc: &Value) -> Result<Hierarchy, ParseError> {
    let items = top_level_items(doc)?;
    let mut properties = Vec::with_capacity(items.len());
    for (path, item) in items {
        properties.push(decode_property(item, &path, None)?);
    }
    Ok(Hierarchy::new(properties))
}

/// Decode an annotated export (shape B), splitting annotations out.
///
/// Every non-blank `_annotation_after` on a non-terminal email becomes an
/// entry keyed `(thread id, email index)` holding the trimmed text. Values on
/// a thread's last email name no gap and are dropped. The returned emails
/// never carry annotation data.
pub fn decode_annotated_export(doc: &Value) -> Result<(Hierarchy, AnnotationStore), ParseError> {
    let items = top_level_items(doc)?;
    let mut annotations = AnnotationStore::new();

    let legacy = !items.is_empty()
        && items
            .iter()
            .all(|(_, item)| item.get("threads").is_none() && item.get("emails").is_some());

    if legacy {
        let mut threads = Vec::with_capacity(items.len());
        for (path, item) in items {
            threads.push(decode_thread(item, &path, Some(&mut annotations))?);
        }
        let hierarchy = Hierarchy::new(vec![Property {
            id: LEGACY_PROPERTY_ID.to_string(),
            subject: LEGACY_PROPERTY_SUBJECT.to_string(),
            property: String::new(),
            threads,
        }]);
        return Ok((hierarchy, annotations));
    }

    let mut properties = Vec::with_capacity(items.len());
    for (path, item) in items {
        properties.push(decode_property(item, &path, Some(&mut annotations))?);
    }
    Ok((Hierarchy::new(properties), annotations))
}

/// Encode a hierarchy as a preprocessed (shape A) document.
///
/// Counts are written from the nested sequences. Used for persistence
/// snapshots, where annotations travel separately.
pub fn encode_preprocessed(hierarchy: &Hierarchy) -> Vec<WireProperty<'_>> {
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
                    emails: t.emails.iter().map(|e| wire_email(e, None)).collect(),
                })
                .collect(),
            metadata: None,
        })
        .collect()
}

pub(crate) fn wire_email<'a>(email: &'a Email, annotation: Option<Option<&'a str>>) -> WireEmail<'a> {
    WireEmail {
        id: &email.id,
        from: &email.sender,
        to: email.recipient.as_deref(),
        date: email.timestamp.as_deref(),
        date_display: &email.display_timestamp,
        subject: email.subject.as_deref(),
        body: &email.body,
        annotation_after: annotation,
    }
}

/// Human-readable form of an ISO-8601 timestamp, e.g. `Dec 12, 02:34 PM`.
///
/// Missing or blank input yields [`UNKNOWN_DATE`]; unparseable input is
/// returned unchanged. The timestamp's own offset is kept (no conversion).
pub fn display_timestamp(timestamp: Option<&str>) -> String {
    let raw = match timestamp.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return UNKNOWN_DATE.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(DISPLAY_FORMAT).to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format(DISPLAY_FORMAT).to_string();
    }
    raw.to_string()
}

// ============ Value walking ============

pub(crate) fn top_level_items(doc: &Value) -> Result<Vec<(String, &Value)>, ParseError> {
    match doc {
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| (format!("$[{}]", i), item))
            .collect()),
        Value::Object(_) => Ok(vec![("$".to_string(), doc)]),
        _ => Err(ParseError::WrongType {
            path: "$".to_string(),
            expected: "an array or an object",
        }),
    }
}

fn decode_property(
    value: &Value,
    path: &str,
    mut annotations: Option<&mut AnnotationStore>,
) -> Result<Property, ParseError> {
    let obj = as_object(value, path)?;
    let id = required_id(obj, path)?;
    let subject = optional_str(obj, "subject", path)?.unwrap_or_default();
    let property = optional_str(obj, "property", path)?.unwrap_or_default();

    let threads_path = format!("{}.threads", path);
    let raw_threads = required_array(obj, "threads", path)?;
    let mut threads = Vec::with_capacity(raw_threads.len());
    for (i, raw) in raw_threads.iter().enumerate() {
        let thread_path = format!("{}[{}]", threads_path, i);
        threads.push(decode_thread(raw, &thread_path, annotations.as_deref_mut())?);
    }

    Ok(Property {
        id,
        subject,
        property,
        threads,
    })
}

fn decode_thread(
    value: &Value,
    path: &str,
    mut annotations: Option<&mut AnnotationStore>,
) -> Result<Thread, ParseError> {
    let obj = as_object(value, path)?;
    let id = required_id(obj, path)?;
    let subject = optional_str(obj, "subject", path)?.unwrap_or_default();
    let normalized_subject = match optional_str(obj, "normalized_subject", path)? {
        Some(s) => s,
        None => normalize_subject(&subject),
    };

    let raw_emails = required_array(obj, "emails", path)?;
    let last = raw_emails.len().saturating_sub(1);
    let mut emails = Vec::with_capacity(raw_emails.len());
    for (i, raw) in raw_emails.iter().enumerate() {
        let email_path = format!("{}.emails[{}]", path, i);
        let email_obj = as_object(raw, &email_path)?;
        emails.push(decode_email(email_obj, &email_path, i)?);

        if let Some(store) = annotations.as_deref_mut() {
            let text = optional_str(email_obj, ANNOTATION_FIELD, &email_path)?;
            if let Some(text) = text {
                if i < last && !is_blank(&text) {
                    store.set(&id, i, text.trim());
                }
            }
        }
    }

    Ok(Thread {
        id,
        subject,
        normalized_subject,
        emails,
    })
}

pub(crate) fn decode_email(obj: &Map<String, Value>, path: &str, index: usize) -> Result<Email, ParseError> {
    let id = match obj.get("id") {
        None | Some(Value::Null) => format!("msg_{}", index),
        Some(_) => required_id(obj, path)?,
    };
    let timestamp = optional_str(obj, "date", path)?;
    let display_timestamp = match optional_str(obj, "dateDisplay", path)? {
        Some(s) if !s.is_empty() => s,
        _ => display_timestamp(timestamp.as_deref()),
    };

    Ok(Email {
        id,
        sender: required_str(obj, "from", path)?,
        recipient: optional_str(obj, "to", path)?,
        timestamp,
        display_timestamp,
        subject: optional_str(obj, "subject", path)?,
        body: required_str(obj, "body", path)?,
    })
}

pub(crate) fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value.as_object().ok_or_else(|| ParseError::WrongType {
        path: path.to_string(),
        expected: "an object",
    })
}

/// Identifiers may be strings or numbers on the wire; both become strings.
pub(crate) fn required_id(obj: &Map<String, Value>, path: &str) -> Result<String, ParseError> {
    match obj.get("id") {
        None | Some(Value::Null) => Err(ParseError::MissingField {
            path: path.to_string(),
            field: "id",
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ParseError::WrongType {
            path: format!("{}.id", path),
            expected: "a string or a number",
        }),
    }
}

fn required_str(
    obj: &Map<String, Value>,
    field: &'static str,
    path: &str,
) -> Result<String, ParseError> {
    optional_str(obj, field, path)?.ok_or_else(|| ParseError::MissingField {
        path: path.to_string(),
        field,
    })
}

pub(crate) fn optional_str(
    obj: &Map<String, Value>,
    field: &'static str,
    path: &str,
) -> Result<Option<String>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ParseError::WrongType {
            path: format!("{}.{}", path, field),
            expected: "a string or null",
        }),
    }
}

pub(crate) fn required_array<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
    path: &str,
) -> Result<&'a Vec<Value>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ParseError::MissingField {
            path: path.to_string(),
            field,
        }),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ParseError::WrongType {
            path: format!("{}.{}", path, field),
            expected: "an array",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn preprocessed_doc() -> Value {
        json!([{
            "id": "prop_7250_franklin",
            "subject": "7250 Franklin",
            "property": "7250 franklin",
            "thread_count": 1,
            "email_count": 3,
            "threads": [{
                "id": "prop_7250_franklin_thread_0",
                "subject": "7250 Franklin Ave - offer",
                "normalized_subject": "7250 franklin ave - offer",
                "email_count": 3,
                "emails": [
                    {"id": "a1", "from": "agent@x.com", "to": "buyer@x.com",
                     "date": "2024-03-01T09:15:00-08:00", "subject": "7250 Franklin Ave - offer",
                     "body": "Offer attached."},
                    {"from": "buyer@x.com", "date": "2024-03-02T10:00:00-08:00",
                     "dateDisplay": "Mar 02, 10:00 AM", "body": "Signed."},
                    {"id": "a3", "from": "escrow@x.com", "body": "Opened escrow."}
                ]
            }]
        }])
    }

    #[test]
    fn test_decode_preprocessed_renames_fields() {
        let h = decode_preprocessed(&preprocessed_doc()).unwrap();
        assert_eq!(h.property_count(), 1);
        let t = &h.properties[0].threads[0];
        assert_eq!(t.email_count(), 3);

        let first = &t.emails[0];
        assert_eq!(first.id, "a1");
        assert_eq!(first.sender, "agent@x.com");
        assert_eq!(first.recipient.as_deref(), Some("buyer@x.com"));
        assert_eq!(first.timestamp.as_deref(), Some("2024-03-01T09:15:00-08:00"));
        assert_eq!(first.display_timestamp, "Mar 01, 09:15 AM");
    }

    #[test]
    fn test_decode_preprocessed_positional_email_id() {
        let h = decode_preprocessed(&preprocessed_doc()).unwrap();
        let t = &h.properties[0].threads[0];
        assert_eq!(t.emails[1].id, "msg_1");
        assert_eq!(t.emails[1].display_timestamp, "Mar 02, 10:00 AM");
        assert_eq!(t.emails[2].display_timestamp, UNKNOWN_DATE);
    }

    #[test]
    fn test_single_object_is_one_element_list() {
        let doc = preprocessed_doc()[0].clone();
        let h = decode_preprocessed(&doc).unwrap();
        assert_eq!(h.property_count(), 1);
        assert_eq!(h.properties[0].id, "prop_7250_franklin");
    }

    #[test]
    fn test_counts_recomputed_not_trusted() {
        let mut doc = preprocessed_doc();
        doc[0]["email_count"] = json!(99);
        doc[0]["threads"][0]["email_count"] = json!(0);
        let h = decode_preprocessed(&doc).unwrap();
        assert_eq!(h.properties[0].email_count(), 3);
        assert_eq!(h.properties[0].threads[0].email_count(), 3);
    }

    #[test]
    fn test_missing_threads_names_path() {
        let doc = json!([{"id": "p0", "threads": []}, {"id": "p1"}]);
        let err = decode_preprocessed(&doc).unwrap_err();
        assert_eq!(err.path(), Some("$[1]"));
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn test_missing_email_sender_names_path() {
        let mut doc = preprocessed_doc();
        doc[0]["threads"][0]["emails"][2]
            .as_object_mut()
            .unwrap()
            .remove("from");
        let err = decode_preprocessed(&doc).unwrap_err();
        assert_eq!(err.path(), Some("$[0].threads[0].emails[2]"));
        assert!(err.to_string().contains("`from`"));
    }

    #[test]
    fn test_wrong_type_names_field_path() {
        let mut doc = preprocessed_doc();
        doc[0]["threads"][0]["emails"] = json!("not a list");
        let err = decode_preprocessed(&doc).unwrap_err();
        assert_eq!(err.path(), Some("$[0].threads[0].emails"));
    }

    #[test]
    fn test_scalar_top_level_rejected() {
        let err = decode_preprocessed(&json!(42)).unwrap_err();
        assert_eq!(err.path(), Some("$"));
        assert!(decode_annotated_export(&json!("x")).is_err());
    }

    #[test]
    fn test_thread_id_is_required() {
        let doc = json!([{"id": "p", "threads": [{"emails": []}]}]);
        let err = decode_preprocessed(&doc).unwrap_err();
        assert_eq!(err.path(), Some("$[0].threads[0]"));
    }

    #[test]
    fn test_numeric_ids_accepted() {
        let doc = json!([{"id": 7, "threads": [{"id": 8, "emails": [
            {"id": 9, "from": "a", "body": "b"}
        ]}]}]);
        let h = decode_preprocessed(&doc).unwrap();
        assert_eq!(h.properties[0].id, "7");
        assert_eq!(h.properties[0].threads[0].id, "8");
        assert_eq!(h.properties[0].threads[0].emails[0].id, "9");
    }

    #[test]
    fn test_normalized_subject_falls_back_to_subject() {
        let doc = json!([{"id": "p", "threads": [{"id": "t", "subject": "RE: Fwd:  Escrow  Docs", "emails": []}]}]);
        let h = decode_preprocessed(&doc).unwrap();
        assert_eq!(h.properties[0].threads[0].normalized_subject, "escrow docs");
    }

    #[test]
    fn test_detect_shape_by_presence() {
        let plain = preprocessed_doc();
        assert_eq!(detect_shape(&plain), Shape::Preprocessed);

        let mut with_null = preprocessed_doc();
        with_null[0]["threads"][0]["emails"][2][ANNOTATION_FIELD] = Value::Null;
        assert_eq!(detect_shape(&with_null), Shape::AnnotatedExport);

        let mut with_empty = preprocessed_doc();
        with_empty[0]["threads"][0]["emails"][0][ANNOTATION_FIELD] = json!("");
        assert_eq!(detect_shape(&with_empty), Shape::AnnotatedExport);
    }

    #[test]
    fn test_detect_shape_is_total() {
        for doc in [json!(null), json!(1), json!("s"), json!([1, "x", null]), json!({"threads": 3}),
                    json!([{"threads": [{"emails": "nope"}]}]), json!({})] {
            assert_eq!(detect_shape(&doc), Shape::Preprocessed);
        }
        let legacy = json!([{"id": "t", "emails": [{"_annotation_after": null}]}]);
        assert_eq!(detect_shape(&legacy), Shape::AnnotatedExport);
    }

    #[test]
    fn test_decode_annotated_extracts_and_strips() {
        let mut doc = preprocessed_doc();
        let emails = &mut doc[0]["threads"][0]["emails"];
        emails[0][ANNOTATION_FIELD] = json!("  Sent offer to listing agent ");
        emails[1][ANNOTATION_FIELD] = json!("   ");
        emails[2][ANNOTATION_FIELD] = json!("terminal, ignored");

        let (h, a) = decode_annotated_export(&doc).unwrap();
        assert_eq!(h.email_count(), 3);
        assert_eq!(a.len(), 1);
        assert_eq!(
            a.get("prop_7250_franklin_thread_0", 0),
            Some("Sent offer to listing agent")
        );
        assert_eq!(a.get("prop_7250_franklin_thread_0", 2), None);
    }

    #[test]
    fn test_annotation_wrong_type_fails() {
        let mut doc = preprocessed_doc();
        doc[0]["threads"][0]["emails"][0][ANNOTATION_FIELD] = json!({"summary": "x"});
        let err = decode_annotated_export(&doc).unwrap_err();
        assert_eq!(
            err.path(),
            Some("$[0].threads[0].emails[0]._annotation_after")
        );
    }

    #[test]
    fn test_legacy_flat_lift() {
        let doc = json!([
            {"id": "t1", "subject": "Inspection", "emails": [
                {"id": "e1", "from": "a", "body": "x", "_annotation_after": "booked inspector"},
                {"id": "e2", "from": "b", "body": "y", "_annotation_after": null},
                {"id": "e3", "from": "c", "body": "z", "_annotation_after": null}
            ]},
            {"id": "t2", "subject": "Appraisal", "emails": [
                {"id": "e4", "from": "a", "body": "x", "_annotation_after": null},
                {"id": "e5", "from": "b", "body": "y", "_annotation_after": null}
            ]}
        ]);
        let (h, a) = decode_annotated_export(&doc).unwrap();
        assert_eq!(h.property_count(), 1);
        let p = &h.properties[0];
        assert_eq!(p.id, LEGACY_PROPERTY_ID);
        assert_eq!(p.thread_count(), 2);
        assert_eq!(p.email_count(), 5);
        assert_eq!(a.get("t1", 0), Some("booked inspector"));
    }

    #[test]
    fn test_decode_document_dispatches() {
        let plain = preprocessed_doc();
        assert!(matches!(
            decode_document(&plain).unwrap(),
            ImportDocument::Preprocessed(_)
        ));

        let mut annotated = preprocessed_doc();
        annotated[0]["threads"][0]["emails"][0][ANNOTATION_FIELD] = json!("x");
        let decoded = decode_document(&annotated).unwrap();
        assert_eq!(decoded.shape(), Shape::AnnotatedExport);
        assert_eq!(decoded.hierarchy().email_count(), 3);
    }

    #[test]
    fn test_encode_preprocessed_round_trip() {
        let h = decode_preprocessed(&preprocessed_doc()).unwrap();
        let encoded = serde_json::to_value(encode_preprocessed(&h)).unwrap();
        assert_eq!(detect_shape(&encoded), Shape::Preprocessed);
        assert_eq!(encoded[0]["thread_count"], json!(1));
        assert_eq!(encoded[0]["threads"][0]["emails"][1]["id"], json!("msg_1"));
        assert!(encoded[0].get("_metadata").is_none());
        assert_eq!(decode_preprocessed(&encoded).unwrap(), h);
    }

    #[test]
    fn test_display_timestamp_variants() {
        assert_eq!(display_timestamp(None), UNKNOWN_DATE);
        assert_eq!(display_timestamp(Some("  ")), UNKNOWN_DATE);
        assert_eq!(
            display_timestamp(Some("2023-12-12T14:34:00Z")),
            "Dec 12, 02:34 PM"
        );
        assert_eq!(
            display_timestamp(Some("2023-12-12T14:34:00")),
            "Dec 12, 02:34 PM"
        );
        assert_eq!(display_timestamp(Some("last tuesday")), "last tuesday");
    }

    #[test]
    fn test_parse_json_syntax_error() {
        let err = parse_json(b"[{").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
        assert!(err.path().is_none());
    }
}
