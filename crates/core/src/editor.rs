//! The annotation engine as one object.
//!
//! [`AnnotationEditor`] owns the session, the store, the capture machine and
//! the overlay, and repaints the overlay explicitly after every call that
//! changes what is visible: a commit, a live stroke point, a page switch, a
//! clear, a resize or a load.

use crate::annotation::{Color, Point, Tool};
use crate::capture::{CaptureOutcome, CaptureStateMachine, CommentPrompt};
use crate::config::EngineConfig;
use crate::error::{ExportResult, SessionResult};
use crate::export::{ExportPipeline, ExportReport};
use crate::font::{FontCache, FontSource};
use crate::mapper::PreviewSurface;
use crate::render::{OverlaySurface, RenderPipeline, RenderReport};
use crate::session::DocumentSession;
use crate::store::AnnotationStore;
use pdf_engine::{OpenSource, PdfEngine};

/// Finished export, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

pub struct AnnotationEditor<E: PdfEngine, S: PreviewSurface> {
    config: EngineConfig,
    session: DocumentSession<E>,
    store: AnnotationStore,
    capture: CaptureStateMachine,
    render: RenderPipeline,
    surface: S,
    fonts: FontCache,
}

impl<E: PdfEngine, S: PreviewSurface> AnnotationEditor<E, S> {
    pub fn new(engine: E, surface: S, config: EngineConfig) -> Self {
        let render = RenderPipeline::new(surface.rendered_size());
        Self {
            session: DocumentSession::new(engine),
            store: AnnotationStore::new(),
            capture: CaptureStateMachine::new(config.default_color),
            render,
            surface,
            fonts: FontCache::from_config(&config),
            config,
        }
    }

    /// Replace the configured comment font source.
    pub fn with_font_source(mut self, source: impl FontSource + 'static) -> Self {
        self.fonts = FontCache::new(source);
        self
    }

    /// Load a document, discarding every annotation and any live stroke from
    /// the previous one. On failure nothing changes. A document without pages
    /// loads with no preview and a blank overlay.
    pub fn load_document(&mut self, source: OpenSource, name: Option<String>) -> SessionResult<u32> {
        let page_count = self.session.load(source, name)?;

        if !self.store.is_empty() {
            log::info!("discarding {} annotation(s) from the previous document", self.store.len());
        }
        self.store.clear_all();
        self.capture.cancel_gesture();
        self.surface_resized();
        Ok(page_count)
    }

    pub fn select_tool(&mut self, tool: Tool) -> CaptureOutcome {
        let outcome = self.capture.select_tool(tool);
        self.apply(self.session.current_page(), outcome)
    }

    pub fn set_color(&mut self, color: Color) {
        self.capture.set_color(color);
    }

    /// Ignored until a document with at least one page is loaded. The
    /// annotation lands on the page that was current when the pointer went
    /// down.
    pub async fn pointer_down<P: CommentPrompt>(&mut self, position: Point, prompt: &mut P) -> CaptureOutcome {
        if self.session.page_count() == 0 {
            return CaptureOutcome::Ignored;
        }
        let page = self.session.current_page();
        let outcome = self.capture.pointer_down(position, prompt).await;
        self.apply(page, outcome)
    }

    pub fn pointer_move(&mut self, position: Point) -> CaptureOutcome {
        let outcome = self.capture.pointer_move(position);
        self.apply(self.session.current_page(), outcome)
    }

    pub fn pointer_up(&mut self) -> CaptureOutcome {
        let outcome = self.capture.pointer_up();
        self.apply(self.session.current_page(), outcome)
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
        log::debug!("annotations cleared");
        self.render_now();
    }

    /// A live stroke is finished on the page it was drawn on before switching.
    pub fn go_to_page(&mut self, page: u32) -> SessionResult<()> {
        self.session.page_size(page)?;
        self.finish_gesture();
        self.session.go_to_page(page)?;
        self.show_current_page()
    }

    pub fn next_page(&mut self) -> SessionResult<bool> {
        self.finish_gesture();
        if !self.session.next_page() {
            return Ok(false);
        }
        self.show_current_page()?;
        Ok(true)
    }

    pub fn previous_page(&mut self) -> SessionResult<bool> {
        self.finish_gesture();
        if !self.session.previous_page() {
            return Ok(false);
        }
        self.show_current_page()?;
        Ok(true)
    }

    /// Re-derive the overlay size from the preview surface and repaint.
    pub fn surface_resized(&mut self) -> RenderReport {
        self.render.resize(self.surface.rendered_size());
        self.render_now()
    }

    /// Repaint the current page and any live stroke.
    pub fn render_now(&mut self) -> RenderReport {
        let page = self.session.current_page();
        self.render.render(page, &self.store, self.capture.live_stroke(), &self.config)
    }

    /// Burn every annotation into a copy of the loaded document.
    ///
    /// # Errors
    /// Returns an error if there is no document, another operation is in
    /// flight, the font cannot be fetched or the PDF cannot be written. The
    /// store, the overlay and the loaded document are unchanged either way.
    pub fn export(&mut self) -> ExportResult<ExportedDocument> {
        let Self { session, store, config, fonts, .. } = self;
        let (bytes, report) =
            session.export_with(|editor| ExportPipeline::new(config, fonts).export(editor, store))?;

        Ok(ExportedDocument { file_name: session.export_file_name(), bytes, report })
    }

    pub fn tool(&self) -> Tool {
        self.capture.tool()
    }

    pub fn color(&self) -> Color {
        self.capture.color()
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn session(&self) -> &DocumentSession<E> {
        &self.session
    }

    pub fn capture(&self) -> &CaptureStateMachine {
        &self.capture
    }

    pub fn overlay(&self) -> &OverlaySurface {
        self.render.overlay()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn finish_gesture(&mut self) {
        let outcome = self.capture.finish_gesture();
        self.apply(self.session.current_page(), outcome);
    }

    fn show_current_page(&mut self) -> SessionResult<()> {
        self.session.refresh_preview()?;
        self.surface_resized();
        Ok(())
    }

    fn apply(&mut self, page: u32, outcome: CaptureOutcome) -> CaptureOutcome {
        if let CaptureOutcome::Committed(annotation) = &outcome {
            self.store.append(page, annotation.clone());
        }
        if outcome.needs_render() {
            self.render_now();
        }
        outcome
    }
}
