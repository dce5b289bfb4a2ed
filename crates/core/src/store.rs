//! Page-indexed, append-only annotation log.

use crate::annotation::Annotation;
use std::collections::BTreeMap;

/// Annotations per page, in paint order (later entries draw on top).
///
/// Page indices are not range-checked here; stale indices are skipped by the
/// render and export pipelines.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    pages: BTreeMap<u32, Vec<Annotation>>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, page: u32, annotation: Annotation) {
        self.pages.entry(page).or_default().push(annotation);
    }

    /// The page's annotations, empty when the page has none.
    pub fn get(&self, page: u32) -> &[Annotation] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop every page at once. No empty page entries survive.
    pub fn clear_all(&mut self) {
        self.pages.clear();
    }

    /// Pages that hold at least one annotation, ascending.
    pub fn pages(&self) -> impl Iterator<Item = (u32, &[Annotation])> + '_ {
        self.pages.iter().map(|(page, annotations)| (*page, annotations.as_slice()))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total annotations across all pages.
    pub fn len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
