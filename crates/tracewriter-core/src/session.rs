//! Explicit session state.
//!
//! A [`Session`] owns the working hierarchy, the annotation store, and the
//! navigation cursor. Every mutation is a method call on a value the caller
//! holds; nothing here is global.

use crate::annotations::AnnotationStore;
use crate::codec::{decode_document, parse_json, ImportDocument, Shape};
use crate::error::ParseError;
use crate::export::{synthesize, ExportOptions};
use crate::models::{Email, Hierarchy, Property, Thread};
use crate::wire::WireProperty;

/// Position of the reader within the hierarchy.
///
/// Indices always point inside the current hierarchy, or are `0` when the
/// level they index is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub property: usize,
    pub thread: usize,
    pub email: usize,
    /// Gap currently open for editing, if any.
    pub focused_gap: Option<usize>,
}

/// What an import changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub shape: Shape,
    pub properties: usize,
    pub threads: usize,
    pub emails: usize,
    /// Annotations carried by the document (zero for the preprocessed shape).
    pub imported_annotations: usize,
}

/// Annotation progress of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadProgress {
    pub property_id: String,
    pub thread_id: String,
    pub subject: String,
    pub emails: usize,
    pub gaps: usize,
    pub annotated: usize,
}

impl ThreadProgress {
    pub fn is_complete(&self) -> bool {
        self.annotated == self.gaps
    }
}

/// Totals across the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub properties: usize,
    pub threads: usize,
    pub emails: usize,
    pub gaps: usize,
    pub annotated: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    hierarchy: Hierarchy,
    annotations: AnnotationStore,
    cursor: Cursor,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(hierarchy: Hierarchy, annotations: AnnotationStore) -> Self {
        Self {
            hierarchy,
            annotations,
            cursor: Cursor::default(),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn into_parts(self) -> (Hierarchy, AnnotationStore) {
        (self.hierarchy, self.annotations)
    }

    /// Replace hierarchy and annotations wholesale and reset the cursor.
    pub fn replace(&mut self, hierarchy: Hierarchy, annotations: AnnotationStore) {
        self.hierarchy = hierarchy;
        self.annotations = annotations;
        self.cursor = Cursor::default();
    }

    /// Apply a decoded document.
    ///
    /// Both shapes replace the hierarchy. A preprocessed document leaves the
    /// annotation store as it is; an annotated export is merged into it,
    /// with imported keys overwriting session keys.
    pub fn apply_import(&mut self, doc: ImportDocument) -> ImportSummary {
        let shape = doc.shape();
        let (hierarchy, imported) = match doc {
            ImportDocument::Preprocessed(h) => (h, AnnotationStore::new()),
            ImportDocument::AnnotatedExport {
                hierarchy,
                annotations,
            } => (hierarchy, annotations),
        };

        let summary = ImportSummary {
            shape,
            properties: hierarchy.property_count(),
            threads: hierarchy.thread_count(),
            emails: hierarchy.email_count(),
            imported_annotations: imported.len(),
        };

        self.hierarchy = hierarchy;
        self.annotations.merge_from(imported);
        self.cursor = Cursor::default();
        summary
    }

    /// Parse, decode and apply raw document bytes.
    ///
    /// On error the session is untouched.
    pub fn import_json(&mut self, bytes: &[u8]) -> Result<ImportSummary, ParseError> {
        let doc = decode_document(&parse_json(bytes)?)?;
        Ok(self.apply_import(doc))
    }

    /// Set the annotation of a gap. Never range-checked.
    pub fn annotate(&mut self, thread_id: &str, index: usize, text: impl Into<String>) {
        self.annotations.set(thread_id, index, text);
    }

    /// Set the annotation of the focused gap of the current thread.
    ///
    /// Returns `false` if no gap is focused.
    pub fn annotate_focused(&mut self, text: impl Into<String>) -> bool {
        let Some(index) = self.cursor.focused_gap else {
            return false;
        };
        let Some(thread_id) = self.current_thread().map(|t| t.id.clone()) else {
            return false;
        };
        self.annotations.set(&thread_id, index, text);
        true
    }

    pub fn current_property(&self) -> Option<&Property> {
        self.hierarchy.properties.get(self.cursor.property)
    }

    pub fn current_thread(&self) -> Option<&Thread> {
        self.current_property()?.threads.get(self.cursor.thread)
    }

    pub fn current_email(&self) -> Option<&Email> {
        self.current_thread()?.emails.get(self.cursor.email)
    }

    /// Move to a property, clamped to the last one. Resets thread, email and
    /// gap focus.
    pub fn select_property(&mut self, index: usize) {
        let len = self.hierarchy.property_count();
        self.cursor = Cursor {
            property: clamp(index, len),
            ..Cursor::default()
        };
    }

    /// Move to a thread of the current property. Resets email and focus.
    pub fn select_thread(&mut self, index: usize) {
        let len = self.current_property().map_or(0, Property::thread_count);
        self.cursor.thread = clamp(index, len);
        self.cursor.email = 0;
        self.cursor.focused_gap = None;
    }

    /// Move to an email of the current thread.
    pub fn select_email(&mut self, index: usize) {
        let len = self.current_thread().map_or(0, Thread::email_count);
        self.cursor.email = clamp(index, len);
    }

    /// Focus a gap of the current thread. Returns `false` and leaves the
    /// focus unchanged if the gap does not exist.
    pub fn focus_gap(&mut self, index: usize) -> bool {
        if self.current_thread().is_some_and(|t| t.has_gap(index)) {
            self.cursor.focused_gap = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear_focus(&mut self) {
        self.cursor.focused_gap = None;
    }

    /// Progress of a single thread, or `None` if it is not in the hierarchy.
    pub fn thread_progress(&self, thread_id: &str) -> Option<ThreadProgress> {
        self.hierarchy
            .threads()
            .find(|(_, t)| t.id == thread_id)
            .map(|(p, t)| self.progress_of(p, t))
    }

    /// Per-thread progress in hierarchy order.
    pub fn thread_progress_all(&self) -> Vec<ThreadProgress> {
        self.hierarchy
            .threads()
            .map(|(p, t)| self.progress_of(p, t))
            .collect()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            properties: self.hierarchy.property_count(),
            threads: self.hierarchy.thread_count(),
            emails: self.hierarchy.email_count(),
            gaps: self.hierarchy.gap_count(),
            annotated: self.annotations.annotated_gap_count(&self.hierarchy),
        }
    }

    pub fn export(&self, options: &ExportOptions) -> Vec<WireProperty<'_>> {
        synthesize(&self.hierarchy, &self.annotations, options)
    }

    fn progress_of(&self, property: &Property, thread: &Thread) -> ThreadProgress {
        ThreadProgress {
            property_id: property.id.clone(),
            thread_id: thread.id.clone(),
            subject: thread.subject.clone(),
            emails: thread.email_count(),
            gaps: thread.gap_count(),
            annotated: self
                .annotations
                .count_annotated(&thread.id, thread.gap_count()),
        }
    }
}

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
