//! PDF primitives used by the annotation engine.
//!
//! The engine never parses or writes PDF syntax itself. It goes through two
//! capability traits: [`PdfEngine`] (open, inspect, extract preview pages,
//! start an edit) and [`DocumentEditor`] (add pages, embed a font, draw
//! rectangles, paths and text, serialize). [`LopdfEngine`] is the default
//! backend.

mod editor;
mod font;

pub use editor::LopdfEditor;
pub use font::{FontAsset, FontId, StandardFont};

use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// US Letter, used when a page carries no usable MediaBox anywhere in its tree.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Axis-aligned rectangle in page space (origin bottom-left, y grows upward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Device RGB with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self { r: r as f32 / 255.0, g: g as f32 / 255.0, b: b as f32 / 255.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: RgbColor,
    /// Constant alpha, `1.0` is opaque.
    pub opacity: f32,
}

impl Paint {
    pub fn opaque(color: RgbColor) -> Self {
        Self { color, opacity: 1.0 }
    }
}

/// How a path drawn with [`DocumentEditor::draw_path`] is painted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathPaint {
    /// Open polyline stroked with round caps and joins.
    Stroke { paint: Paint, width: f32 },
    /// Closed polygon filled with the non-zero winding rule.
    Fill { paint: Paint },
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("unknown font {0}")]
    UnknownFont(u32),
    #[error("font error: {0}")]
    Font(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Read-side capability: documents are opened once and addressed by handle.
pub trait PdfEngine {
    type Editor: DocumentEditor;

    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    /// Serialize a standalone one-page document holding only `page_index`.
    fn extract_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<u8>, PdfEngineError>;
    /// Start an edit on a fresh copy of the document. The opened document is
    /// never touched by anything done through the returned editor.
    fn edit(&self, handle: DocumentHandle) -> Result<Self::Editor, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

/// Write-side capability. Coordinates are page space: points, origin at the
/// bottom-left corner of the page's MediaBox.
pub trait DocumentEditor {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError>;
    /// Append an empty page, returning its index.
    fn add_page(&mut self, size: PageSize) -> Result<u32, PdfEngineError>;
    /// Embed `asset` once. `coverage` lists the text the font will be asked to
    /// draw so embedded fonts only describe the glyphs actually used.
    fn embed_font(&mut self, asset: &FontAsset, coverage: &str) -> Result<FontId, PdfEngineError>;
    fn draw_rectangle(
        &mut self,
        page_index: u32,
        rect: Rect,
        paint: Paint,
    ) -> Result<(), PdfEngineError>;
    fn draw_path(
        &mut self,
        page_index: u32,
        points: &[(f32, f32)],
        paint: PathPaint,
    ) -> Result<(), PdfEngineError>;
    /// Draw a single line of text with its baseline starting at `origin`.
    /// Returns how many characters the font had no glyph for; those are drawn
    /// as a substitute (`?` or `.notdef`).
    fn draw_text(
        &mut self,
        page_index: u32,
        font: FontId,
        origin: (f32, f32),
        size: f32,
        color: RgbColor,
        text: &str,
    ) -> Result<usize, PdfEngineError>;
    fn save(self) -> Result<Vec<u8>, PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(bytes: &[u8]) -> Result<Document, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PdfEngineError::EncryptedUnsupported);
        }
        Ok(doc)
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        let doc = Self::load(bytes)?;
        Ok(doc
            .get_pages()
            .values()
            .map(|page_id| {
                let media_box = media_box(&doc, *page_id);
                PageSize { width_pt: media_box.width, height_pt: media_box.height }
            })
            .collect())
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn check_page(record: &DocumentRecord, page_index: u32) -> Result<(), PdfEngineError> {
        let page_count = record.page_sizes.len() as u32;
        if page_index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: page_index, page_count });
        }
        Ok(())
    }
}

impl PdfEngine for LopdfEngine {
    type Editor = LopdfEditor;

    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened document {} with {} page(s)", handle.raw(), page_sizes.len());
        self.docs.insert(handle, DocumentRecord { bytes, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        Self::check_page(record, page_index)?;
        Ok(record.page_sizes[page_index as usize])
    }

    fn extract_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<u8>, PdfEngineError> {
        let record = self.record(handle)?;
        Self::check_page(record, page_index)?;

        let mut doc = Self::load(&record.bytes)?;
        let others: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|number| *number != page_index + 1)
            .collect();
        doc.delete_pages(&others);
        doc.prune_objects();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn edit(&self, handle: DocumentHandle) -> Result<LopdfEditor, PdfEngineError> {
        let record = self.record(handle)?;
        LopdfEditor::from_document(Self::load(&record.bytes)?)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Effective MediaBox of a page, following `/Parent` inheritance.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|array| {
            if array.len() != 4 {
                return None;
            }
            let x0 = array[0].as_float().ok()?;
            let y0 = array[1].as_float().ok()?;
            let x1 = array[2].as_float().ok()?;
            let y1 = array[3].as_float().ok()?;
            Some(Rect {
                x: x0.min(x1),
                y: y0.min(y1),
                width: (x1 - x0).abs(),
                height: (y1 - y0).abs(),
            })
        })
        .unwrap_or(Rect {
            x: 0.0,
            y: 0.0,
            width: DEFAULT_PAGE_SIZE.width_pt,
            height: DEFAULT_PAGE_SIZE.height_pt,
        })
}

/// Look up an inheritable page attribute, dereferencing indirect values.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound only guards against /Parent cycles.
    for _ in 0..32 {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, object)| object);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn sample_pdf_bytes(sizes: &[PageSize]) -> Vec<u8> {
        let mut editor = LopdfEditor::new();
        for size in sizes {
            editor.add_page(*size).expect("add page should succeed");
        }
        editor.save().expect("save should succeed")
    }

    fn letter() -> PageSize {
        PageSize { width_pt: 612.0, height_pt: 792.0 }
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(&[letter()])))
            .expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 1);
    }

    #[test]
    fn reads_each_page_size() {
        let a4 = PageSize { width_pt: 595.0, height_pt: 842.0 };
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(&[letter(), a4])))
            .expect("open should succeed");

        assert_eq!(engine.page_size(handle, 0).unwrap(), letter());
        assert_eq!(engine.page_size(handle, 1).unwrap(), a4);
        assert!(matches!(
            engine.page_size(handle, 2),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 2 })
        ));
    }

    #[test]
    fn extract_page_keeps_only_the_requested_page() {
        let tall = PageSize { width_pt: 300.0, height_pt: 900.0 };
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(&[letter(), tall, letter()])))
            .expect("open should succeed");

        let bytes = engine.extract_page(handle, 1).expect("extract should succeed");
        let preview = engine.open(OpenSource::Bytes(bytes)).expect("preview should open");

        assert_eq!(engine.page_count(preview).unwrap(), 1);
        assert_eq!(engine.page_size(preview, 0).unwrap(), tall);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"definitely not a pdf".to_vec()))
            .expect_err("garbage should fail to parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypt_in_document_text_is_not_encryption() {
        let mut doc = Document::load_mem(&sample_pdf_bytes(&[letter()])).unwrap();
        let info_id = doc.add_object(lopdf::dictionary! {
            "Title" => Object::string_literal("/Encrypt handbook"),
        });
        doc.trailer.set("Info", info_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        assert!(bytes.windows(8).any(|window| window == b"/Encrypt"));

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("plain document should open");
        assert_eq!(engine.page_count(handle).unwrap(), 1);
    }

    #[test]
    fn rejects_encrypted_trailer() {
        let mut doc = Document::load_mem(&sample_pdf_bytes(&[letter()])).unwrap();
        let encrypt_id = doc.add_object(lopdf::dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let mut engine = LopdfEngine::new();
        let err = engine.open(OpenSource::Bytes(bytes)).expect_err("encrypted document should fail");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn close_forgets_the_document() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(&[letter()])))
            .expect("open should succeed");

        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.page_count(handle), Err(PdfEngineError::InvalidHandle(_))));
    }

    #[test]
    fn media_box_is_inherited_from_the_page_tree() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(lopdf::dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(lopdf::dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );

        let media = media_box(&doc, page_id);
        assert_eq!(media.width, 595.0);
        assert_eq!(media.height, 842.0);
    }
}
