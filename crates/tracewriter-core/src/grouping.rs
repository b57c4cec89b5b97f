//! Property → thread grouping of an ungrouped archive.
//!
//! The archive normalizer emits one record per property with a flat,
//! chronologically sorted `emails` list. This module splits each property's
//! emails into threads by normalized subject, producing the preprocessed
//! shape the rest of the crate consumes.

use std::collections::HashMap;

use serde_json::Value;

use crate::codec::{as_object, decode_email, optional_str, required_array, required_id, top_level_items};
use crate::error::ParseError;
use crate::models::{Email, Hierarchy, Property, Thread};

const REPLY_PREFIXES: [&str; 3] = ["re", "fwd", "fw"];

/// A property before thread grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UngroupedProperty {
    pub id: String,
    pub subject: String,
    pub property: String,
    pub emails: Vec<Email>,
}

/// Output of [`group_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedArchive {
    pub hierarchy: Hierarchy,
    /// Ids of properties dropped for having too few emails.
    pub skipped: Vec<String>,
}

/// Strip leading `Re:` / `Fwd:` / `Fw:` prefixes (repeatedly, any case),
/// collapse whitespace, and lower-case.
///
/// ```
/// use tracewriter_core::grouping::normalize_subject;
/// assert_eq!(normalize_subject("RE: Fwd: 7250  Franklin Ave"), "7250 franklin ave");
/// ```
pub fn normalize_subject(subject: &str) -> String {
    let mut current = collapse_whitespace(subject);
    loop {
        let stripped = strip_reply_prefix(&current);
        if stripped.len() == current.len() {
            break;
        }
        current = collapse_whitespace(stripped);
    }
    current.to_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_reply_prefix(s: &str) -> &str {
    for prefix in REPLY_PREFIXES {
        let head = match s.get(..prefix.len()) {
            Some(h) => h,
            None => continue,
        };
        if head.eq_ignore_ascii_case(prefix) {
            if let Some(rest) = s[prefix.len()..].strip_prefix(':') {
                return rest.trim_start();
            }
        }
    }
    s
}

fn date_key(email: &Email) -> &str {
    email.timestamp.as_deref().unwrap_or("")
}

fn first_date(thread: &Thread) -> &str {
    thread.emails.first().map(date_key).unwrap_or("")
}

/// Split one property's emails into threads.
///
/// Emails are bucketed by normalized subject in first-seen order; an empty
/// subject gives the email a thread of its own keyed `_no_subject_<id>`.
/// Each bucket is stably sorted by date (undated first) and named
/// `<property id>_thread_<n>` in bucket creation order. Threads are then
/// stably sorted by the date of their first email.
pub fn group_property(ungrouped: UngroupedProperty) -> Property {
    let mut buckets: Vec<(String, Vec<Email>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for email in ungrouped.emails {
        let normalized = normalize_subject(email.subject.as_deref().unwrap_or(""));
        let key = if normalized.is_empty() {
            format!("_no_subject_{}", email.id)
        } else {
            normalized
        };
        match index.get(&key) {
            Some(&slot) => buckets[slot].1.push(email),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![email]));
            }
        }
    }

    let mut threads: Vec<Thread> = buckets
        .into_iter()
        .enumerate()
        .map(|(n, (key, mut emails))| {
            emails.sort_by(|a, b| date_key(a).cmp(date_key(b)));
            let subject = emails
                .first()
                .and_then(|e| e.subject.clone())
                .unwrap_or_default();
            Thread {
                id: format!("{}_thread_{}", ungrouped.id, n),
                subject,
                normalized_subject: key,
                emails,
            }
        })
        .collect();

    threads.sort_by(|a, b| first_date(a).cmp(first_date(b)));

    Property {
        id: ungrouped.id,
        subject: ungrouped.subject,
        property: ungrouped.property,
        threads,
    }
}

/// Decode an ungrouped archive document (list or single object of
/// `{id, subject?, property?, emails: [...]}`).
pub fn decode_ungrouped(doc: &Value) -> Result<Vec<UngroupedProperty>, ParseError> {
    let items = top_level_items(doc)?;
    let mut out = Vec::with_capacity(items.len());
    for (path, item) in items {
        let obj = as_object(item, &path)?;
        let raw_emails = required_array(obj, "emails", &path)?;
        let mut emails = Vec::with_capacity(raw_emails.len());
        for (i, raw) in raw_emails.iter().enumerate() {
            let email_path = format!("{}.emails[{}]", path, i);
            emails.push(decode_email(as_object(raw, &email_path)?, &email_path, i)?);
        }
        out.push(UngroupedProperty {
            id: required_id(obj, &path)?,
            subject: optional_str(obj, "subject", &path)?.unwrap_or_default(),
            property: optional_str(obj, "property", &path)?.unwrap_or_default(),
            emails,
        });
    }
    Ok(out)
}

/// Decode and group a whole archive, dropping properties with fewer than
/// `min_emails` emails.
pub fn group_archive(doc: &Value, min_emails: usize) -> Result<GroupedArchive, ParseError> {
    let mut properties = Vec::new();
    let mut skipped = Vec::new();
    for ungrouped in decode_ungrouped(doc)? {
        if ungrouped.emails.len() < min_emails {
            skipped.push(ungrouped.id);
            continue;
        }
        properties.push(group_property(ungrouped));
    }
    Ok(GroupedArchive {
        hierarchy: Hierarchy::new(properties),
        skipped,
    })
}
