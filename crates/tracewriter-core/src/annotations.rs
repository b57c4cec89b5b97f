//! Gap annotation store.
//!
//! An annotation describes the off-screen work that happened between email
//! `i` and email `i + 1` of a thread. The store maps a [`GapKey`] to free
//! text and is owned by the session, independent of the hierarchy: it is
//! joined to threads only by key lookup.
//!
//! Writes are never validated against the hierarchy. Keys that name a gap
//! which does not exist (a stale thread id, or an index at or past the last
//! email) are kept but never read back by export or progress counts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::Hierarchy;

/// Composite key of a gap: `(thread id, index of the preceding email)`.
///
/// Rendered as `"<thread-id>:<index>"`. Thread ids are globally unique, so
/// the key space is flat across properties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GapKey {
    pub thread_id: String,
    pub index: usize,
}

impl GapKey {
    pub fn new(thread_id: impl Into<String>, index: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            index,
        }
    }
}

impl fmt::Display for GapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.thread_id, self.index)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid gap key `{0}`: expected `<thread-id>:<index>`")]
pub struct InvalidGapKey(pub String);

impl FromStr for GapKey {
    type Err = InvalidGapKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Split on the last colon: thread ids may themselves contain colons.
        let (thread_id, index) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidGapKey(s.to_string()))?;
        if thread_id.is_empty() {
            return Err(InvalidGapKey(s.to_string()));
        }
        let index = index
            .parse::<usize>()
            .map_err(|_| InvalidGapKey(s.to_string()))?;
        Ok(GapKey::new(thread_id, index))
    }
}

/// Returns `true` if `text` counts as "not annotated".
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Mapping from gap key to annotation text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationStore {
    entries: BTreeMap<GapKey, String>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in key order (thread id, then numeric index).
    pub fn iter(&self) -> impl Iterator<Item = (&GapKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Unconditional overwrite. No range check against any hierarchy.
    pub fn set(&mut self, thread_id: &str, index: usize, text: impl Into<String>) {
        self.entries.insert(GapKey::new(thread_id, index), text.into());
    }

    pub fn get(&self, thread_id: &str, index: usize) -> Option<&str> {
        self.entries
            .get(&GapKey::new(thread_id, index))
            .map(String::as_str)
    }

    /// Number of annotated gaps in `0..total_gaps` for one thread.
    ///
    /// Blank values and keys at or past `total_gaps` are not counted.
    pub fn count_annotated(&self, thread_id: &str, total_gaps: usize) -> usize {
        let start = GapKey::new(thread_id, 0);
        let end = GapKey::new(thread_id, total_gaps);
        self.entries
            .range(start..end)
            .filter(|(_, text)| !is_blank(text))
            .count()
    }

    /// Union with `other`; keys present in `other` overwrite ours.
    pub fn merge_from(&mut self, other: AnnotationStore) {
        self.entries.extend(other.entries);
    }

    /// The subset that export would emit: keys naming an existing gap in
    /// `hierarchy`, with non-blank values, trimmed.
    pub fn restricted_to(&self, hierarchy: &Hierarchy) -> AnnotationStore {
        let mut out = AnnotationStore::new();
        for (_, thread) in hierarchy.threads() {
            let start = GapKey::new(thread.id.as_str(), 0);
            let end = GapKey::new(thread.id.as_str(), thread.gap_count());
            for (key, text) in self.entries.range(start..end) {
                if !is_blank(text) {
                    out.entries.insert(key.clone(), text.trim().to_string());
                }
            }
        }
        out
    }

    /// Number of annotated gaps across the whole hierarchy.
    pub fn annotated_gap_count(&self, hierarchy: &Hierarchy) -> usize {
        hierarchy
            .threads()
            .map(|(_, t)| self.count_annotated(&t.id, t.gap_count()))
            .sum()
    }

    /// String-keyed form used by persistence snapshots.
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Rebuild from string keys. Malformed keys are skipped and returned so
    /// the caller can report them.
    pub fn from_wire(map: BTreeMap<String, String>) -> (Self, Vec<String>) {
        let mut store = AnnotationStore::new();
        let mut rejected = Vec::new();
        for (raw, text) in map {
            match raw.parse::<GapKey>() {
                Ok(key) => {
                    store.entries.insert(key, text);
                }
                Err(_) => rejected.push(raw),
            }
        }
        (store, rejected)
    }
}

impl FromIterator<(GapKey, String)> for AnnotationStore {
    fn from_iter<I: IntoIterator<Item = (GapKey, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
