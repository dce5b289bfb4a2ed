//! Error types for session, export and overlay operations.

use crate::font::FontFetchError;
use crate::session::OperationKind;
use pdf_engine::PdfEngineError;

/// Errors that can occur while loading or navigating a document
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load document: {0}")]
    Load(#[source] PdfEngineError),
    #[error("no document loaded")]
    NoDocument,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("{0:?} already in progress")]
    Busy(OperationKind),
    #[error("superseded by a newer {0:?}")]
    Superseded(OperationKind),
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while burning annotations into a document.
///
/// A failed export leaves the store and the loaded document untouched.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF error during export: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("comment font unavailable: {0}")]
    Font(#[from] FontFetchError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("overlay has zero size")]
    EmptySurface,
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::PageOutOfRange { page: 5, page_count: 3 };
        assert_eq!(err.to_string(), "page 5 out of range (page_count=3)");

        let err = SessionError::Busy(OperationKind::Export);
        assert_eq!(err.to_string(), "Export already in progress");

        let err = ExportError::from(SessionError::NoDocument);
        assert_eq!(err.to_string(), "no document loaded");
    }
}
