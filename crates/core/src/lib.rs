//! PDF Annotator Core Library
//!
//! Annotation engine for the PDF annotator: the per-page annotation model,
//! pointer capture, overlay rendering and burning annotations into an
//! exported PDF. Positions are captured in preview surface pixels and flipped
//! into PDF page space only when a document is written.

pub mod annotation;
pub mod capture;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod font;
pub mod layout;
pub mod mapper;
pub mod render;
pub mod session;
pub mod store;

pub use annotation::{Annotation, AnnotationKind, Color, CommentText, Point, Stroke, Tool};
pub use capture::{CaptureOutcome, CaptureState, CaptureStateMachine, CommentPrompt, NoPrompt};
pub use config::{ConfigError, EngineConfig};
pub use editor::{AnnotationEditor, ExportedDocument};
pub use error::{ExportError, ExportResult, RenderError, SessionError, SessionResult};
pub use export::{ExportPipeline, ExportReport, PageExport};
pub use font::{FileFontSource, FontCache, FontFetchError, FontSource, StandardFontSource};
pub use layout::{RenderTarget, Shape};
pub use mapper::{to_page_point, PageCoordinateMapper, PreviewSurface, SurfaceRect, SurfaceSize};
pub use render::{OverlaySurface, RenderPipeline, RenderReport};
pub use session::{
    annotated_file_name, DocumentSession, OperationKind, OperationTicket, OperationTracker,
    PreviewFrame,
};
pub use store::AnnotationStore;

pub use pdf_engine;
