//! Burning stored annotations into page content.
//!
//! Every page in the store is drawn through the same shapes the overlay uses,
//! flipped into page space with that page's own height. The pipeline works on
//! an editor that owns a fresh copy of the document, so nothing is visible to
//! the caller unless the whole export succeeds.

use crate::annotation::{Annotation, Color};
use crate::config::EngineConfig;
use crate::error::{ExportError, ExportResult};
use crate::font::{FontCache, FontFetchError};
use crate::layout::{self, RenderTarget, Shape};
use crate::mapper::PageCoordinateMapper;
use crate::store::AnnotationStore;
use pdf_engine::{DocumentEditor, FontId, Paint, PathPaint};

/// What an export drew.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub pages: Vec<PageExport>,
    /// Store pages that do not exist in the document.
    pub skipped_pages: Vec<u32>,
    pub font_embedded: bool,
    /// Comment characters the font could not draw and that were substituted.
    /// Typically non Latin-1 text under the base-14 fallback font.
    pub replaced_characters: usize,
}

impl ExportReport {
    pub fn annotations(&self) -> usize {
        self.pages.iter().map(|page| page.annotations).sum()
    }

    pub fn primitives(&self) -> usize {
        self.pages.iter().map(|page| page.primitives).sum()
    }

    pub fn page(&self, page: u32) -> Option<&PageExport> {
        self.pages.iter().find(|entry| entry.page == page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageExport {
    pub page: u32,
    pub annotations: usize,
    /// Drawing calls issued. Highlights, underlines and signatures draw one
    /// each; a comment draws two (the marker and its text).
    pub primitives: usize,
}

pub struct ExportPipeline<'a> {
    config: &'a EngineConfig,
    fonts: &'a mut FontCache,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(config: &'a EngineConfig, fonts: &'a mut FontCache) -> Self {
        Self { config, fonts }
    }

    /// Draw every stored annotation into `editor` and serialize it.
    pub fn export<D: DocumentEditor>(
        &mut self,
        mut editor: D,
        store: &AnnotationStore,
    ) -> ExportResult<(Vec<u8>, ExportReport)> {
        let page_count = editor.page_count();
        let mut report = ExportReport::default();

        let mut pages = Vec::with_capacity(store.page_count());
        for (page, annotations) in store.pages() {
            if page >= page_count {
                log::warn!(
                    "skipping {} annotation(s) on page {page}: document has {page_count} page(s)",
                    annotations.len()
                );
                report.skipped_pages.push(page);
                continue;
            }
            pages.push((page, annotations));
        }

        let font = self.setup_font(&mut editor, &pages)?;
        report.font_embedded = font.is_some();

        for (page, annotations) in pages {
            let size = editor.page_size(page)?;
            let mapper = PageCoordinateMapper::new(size.height_pt);
            let mut primitives = 0;
            for annotation in annotations {
                for shape in layout::shapes_for(annotation, self.config, RenderTarget::Export) {
                    report.replaced_characters += draw_shape(&mut editor, page, &mapper, font, &shape)?;
                    primitives += 1;
                }
            }
            log::debug!("page {page}: {} annotation(s), {primitives} primitive(s)", annotations.len());
            report.pages.push(PageExport { page, annotations: annotations.len(), primitives });
        }

        if report.replaced_characters > 0 {
            log::warn!(
                "{} comment character(s) are not covered by the comment font and were substituted",
                report.replaced_characters
            );
        }

        let bytes = editor.save()?;
        log::info!(
            "exported {} annotation(s) on {} page(s), {} bytes",
            report.annotations(),
            report.pages.len(),
            bytes.len()
        );
        Ok((bytes, report))
    }

    /// Embed the comment font once, only when a comment will be drawn.
    fn setup_font<D: DocumentEditor>(
        &mut self,
        editor: &mut D,
        pages: &[(u32, &[Annotation])],
    ) -> ExportResult<Option<FontId>> {
        let coverage: String = pages
            .iter()
            .flat_map(|(_, annotations)| annotations.iter())
            .filter_map(|annotation| match annotation {
                Annotation::Comment { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if coverage.is_empty() {
            return Ok(None);
        }

        let asset = self.fonts.get()?;
        Ok(Some(editor.embed_font(asset, &coverage)?))
    }
}

/// Returns the number of characters the font had to replace.
fn draw_shape<D: DocumentEditor>(
    editor: &mut D,
    page: u32,
    mapper: &PageCoordinateMapper,
    font: Option<FontId>,
    shape: &Shape<'_>,
) -> ExportResult<usize> {
    let replaced = match shape {
        Shape::FillRect { rect, color, alpha } => {
            editor.draw_rectangle(page, mapper.to_page_rect(*rect), paint(*color, *alpha))?;
            0
        }
        Shape::Polyline { points, color, alpha, width } => {
            let paint = PathPaint::Stroke { paint: paint(*color, *alpha), width: *width };
            editor.draw_path(page, &mapper.to_page_points(points), paint)?;
            0
        }
        Shape::FillPolygon { points, color, alpha } => {
            let paint = PathPaint::Fill { paint: paint(*color, *alpha) };
            editor.draw_path(page, &mapper.to_page_points(points), paint)?;
            0
        }
        Shape::Label { origin, size, color, text } => {
            let font = font.ok_or_else(|| {
                ExportError::Font(FontFetchError::Unavailable("no font embedded for comment text".into()))
            })?;
            let origin = mapper.to_page_point(*origin);
            editor.draw_text(page, font, (origin.x, origin.y), *size, color.to_pdf(), text)?
        }
    };
    Ok(replaced)
}

fn paint(color: Color, alpha: f32) -> Paint {
    Paint { color: color.to_pdf(), opacity: alpha }
}
