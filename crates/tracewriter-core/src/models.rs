//! Core data models: the Property → Thread → Email hierarchy.
//!
//! These are the in-memory types every other module works on. They carry no
//! annotation data; annotations live in [`AnnotationStore`](crate::annotations::AnnotationStore)
//! and join to a thread only by `(thread id, gap index)`.
//!
//! Counts (`thread_count`, `email_count`) are methods over the nested
//! sequences, so they cannot drift from the data they describe.

/// A single message.
///
/// Immutable once decoded. The identifier is unique within its thread and
/// survives a decode → export → decode round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: String,
    pub sender: String,
    pub recipient: Option<String>,
    /// ISO-8601 timestamp as supplied upstream.
    pub timestamp: Option<String>,
    /// Human-readable timestamp, e.g. `Dec 12, 02:34 PM`.
    pub display_timestamp: String,
    pub subject: Option<String>,
    pub body: String,
}

/// An ordered conversation within a property.
///
/// Emails are kept in the order they were decoded; nothing in this crate
/// re-sorts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub subject: String,
    /// Subject with reply/forward prefixes stripped. Grouping key only.
    pub normalized_subject: String,
    pub emails: Vec<Email>,
}

impl Thread {
    pub fn email_count(&self) -> usize {
        self.emails.len()
    }

    /// Number of gaps between consecutive emails.
    pub fn gap_count(&self) -> usize {
        self.emails.len().saturating_sub(1)
    }

    /// Whether `index` names a gap that exists (`0..=len-2`).
    ///
    /// The final email never has a gap after it.
    pub fn has_gap(&self, index: usize) -> bool {
        index < self.gap_count()
    }
}

/// Top-level grouping entity: one real-world transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub id: String,
    pub subject: String,
    /// Normalized grouping key (e.g. a street address).
    pub property: String,
    pub threads: Vec<Thread>,
}

impl Property {
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn email_count(&self) -> usize {
        self.threads.iter().map(Thread::email_count).sum()
    }
}

/// The ordered working set of properties.
///
/// Insertion order is import order and is preserved through export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    pub properties: Vec<Property>,
}

impl Hierarchy {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn thread_count(&self) -> usize {
        self.properties.iter().map(Property::thread_count).sum()
    }

    pub fn email_count(&self) -> usize {
        self.properties.iter().map(Property::email_count).sum()
    }

    /// Total number of annotatable gaps across every thread.
    pub fn gap_count(&self) -> usize {
        self.threads().map(|(_, t)| t.gap_count()).sum()
    }

    /// All threads in stored order, paired with their owning property.
    pub fn threads(&self) -> impl Iterator<Item = (&Property, &Thread)> {
        self.properties
            .iter()
            .flat_map(|p| p.threads.iter().map(move |t| (p, t)))
    }

    pub fn find_thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads()
            .map(|(_, t)| t)
            .find(|t| t.id == thread_id)
    }

    /// Whether `(thread_id, index)` names an existing gap.
    pub fn has_gap(&self, thread_id: &str, index: usize) -> bool {
        self.find_thread(thread_id)
            .is_some_and(|t| t.has_gap(index))
    }
}
