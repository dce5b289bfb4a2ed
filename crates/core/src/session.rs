//! Document session
//!
//! Owns the loaded document handle, the page count and sizes, the current page
//! and the preview of that page. Loading, exporting and preview generation are
//! sequenced through an [`OperationTracker`]: one exclusive operation at a
//! time, and results from operations that a newer load has overtaken are
//! dropped.

use crate::error::{ExportError, ExportResult, SessionError, SessionResult};
use pdf_engine::{DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError};
use std::path::Path;

/// Name given to exports of documents loaded without a file name
pub const DEFAULT_EXPORT_NAME: &str = "annotated.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Load,
    Export,
    Preview,
}

impl OperationKind {
    fn is_exclusive(self) -> bool {
        matches!(self, Self::Load | Self::Export)
    }
}

/// Proof that an operation was started; hand it back to
/// [`OperationTracker::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTicket {
    id: u64,
    kind: OperationKind,
    generation: u64,
}

impl OperationTicket {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Document generation the operation was started against
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// In-flight bookkeeping for one session.
///
/// Loads and exports are exclusive: nothing else may start while one runs.
/// Previews may be requested repeatedly; only the newest one is accepted.
/// Every load starts a new document generation, so anything begun before it
/// is stale when it finishes.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    next_id: u64,
    generation: u64,
    exclusive: Option<OperationTicket>,
    latest_preview: Option<u64>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, kind: OperationKind) -> SessionResult<OperationTicket> {
        if let Some(active) = self.exclusive {
            log::warn!("{kind:?} rejected: {:?} in progress", active.kind);
            return Err(SessionError::Busy(active.kind));
        }

        self.next_id += 1;
        if kind == OperationKind::Load {
            self.generation += 1;
        }
        let ticket = OperationTicket { id: self.next_id, kind, generation: self.generation };

        if kind.is_exclusive() {
            self.exclusive = Some(ticket);
        } else {
            self.latest_preview = Some(ticket.id);
        }
        Ok(ticket)
    }

    /// Close out `ticket`. Returns `true` when its result may still be applied.
    pub fn finish(&mut self, ticket: OperationTicket) -> bool {
        let mut current = ticket.generation == self.generation;
        if ticket.kind.is_exclusive() {
            if self.exclusive.map(|active| active.id) == Some(ticket.id) {
                self.exclusive = None;
            }
        } else {
            current &= self.latest_preview == Some(ticket.id);
            if self.latest_preview == Some(ticket.id) {
                self.latest_preview = None;
            }
        }

        if !current {
            log::warn!("dropping stale {:?} result (ticket {})", ticket.kind, ticket.id);
        }
        current
    }

    pub fn is_busy(&self) -> bool {
        self.exclusive.is_some()
    }

    pub fn active(&self) -> Option<OperationKind> {
        self.exclusive.map(|ticket| ticket.kind)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Standalone single-page PDF of the visible page, handed to the host's
/// viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    pub page: u32,
    pub generation: u64,
    pub size: PageSize,
    pub bytes: Vec<u8>,
}

struct OpenedDocument {
    handle: DocumentHandle,
    page_sizes: Vec<PageSize>,
    preview: Option<PreviewFrame>,
}

#[derive(Debug, Clone)]
struct LoadedDocument {
    handle: DocumentHandle,
    name: Option<String>,
    page_sizes: Vec<PageSize>,
}

pub struct DocumentSession<E: PdfEngine> {
    engine: E,
    document: Option<LoadedDocument>,
    current_page: u32,
    tracker: OperationTracker,
    preview: Option<PreviewFrame>,
}

impl<E: PdfEngine> DocumentSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            document: None,
            current_page: 0,
            tracker: OperationTracker::new(),
            preview: None,
        }
    }

    /// Open a document, replacing the current one only on success.
    ///
    /// `name` is the source file name, used to name the export. The first
    /// page's preview is built before anything is replaced; a document without
    /// pages loads with no preview. Returns the new page count.
    ///
    /// # Errors
    /// On failure, including a failed first preview, the previous document,
    /// page and preview stay in place.
    pub fn load(&mut self, source: OpenSource, name: Option<String>) -> SessionResult<u32> {
        let ticket = self.tracker.begin(OperationKind::Load)?;
        let result = self.open(source, ticket.generation());
        self.tracker.finish(ticket);

        let opened = result.map_err(|err| {
            log::warn!("load failed: {err}");
            SessionError::Load(err)
        })?;

        if let Some(previous) = self.document.take() {
            if let Err(err) = self.engine.close(previous.handle) {
                log::warn!("closing previous document failed: {err}");
            }
        }

        let page_count = opened.page_sizes.len() as u32;
        log::info!(
            "loaded {} ({page_count} page(s))",
            name.as_deref().unwrap_or("document")
        );
        self.document =
            Some(LoadedDocument { handle: opened.handle, name, page_sizes: opened.page_sizes });
        self.current_page = 0;
        self.preview = opened.preview;
        Ok(page_count)
    }

    fn open(&mut self, source: OpenSource, generation: u64) -> Result<OpenedDocument, PdfEngineError> {
        let handle = self.engine.open(source)?;
        match self.inspect(handle, generation) {
            Ok((page_sizes, preview)) => Ok(OpenedDocument { handle, page_sizes, preview }),
            Err(err) => {
                let _ = self.engine.close(handle);
                Err(err)
            }
        }
    }

    fn inspect(
        &self,
        handle: DocumentHandle,
        generation: u64,
    ) -> Result<(Vec<PageSize>, Option<PreviewFrame>), PdfEngineError> {
        let page_sizes = (0..self.engine.page_count(handle)?)
            .map(|page| self.engine.page_size(handle, page))
            .collect::<Result<Vec<_>, _>>()?;

        let preview = match page_sizes.first() {
            Some(size) => Some(PreviewFrame {
                page: 0,
                generation,
                size: *size,
                bytes: self.engine.extract_page(handle, 0)?,
            }),
            None => None,
        };
        Ok((page_sizes, preview))
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn handle(&self) -> Option<DocumentHandle> {
        self.document.as_ref().map(|doc| doc.handle)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.document.as_ref().and_then(|doc| doc.name.as_deref())
    }

    /// Zero when nothing is loaded
    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map_or(0, |doc| doc.page_sizes.len() as u32)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self, page: u32) -> SessionResult<PageSize> {
        let doc = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        doc.page_sizes.get(page as usize).copied().ok_or(SessionError::PageOutOfRange {
            page,
            page_count: doc.page_sizes.len() as u32,
        })
    }

    pub fn current_page_size(&self) -> SessionResult<PageSize> {
        self.page_size(self.current_page)
    }

    /// Jump to `page`.
    ///
    /// # Errors
    /// `NoDocument` or `PageOutOfRange`; the current page is left unchanged.
    pub fn go_to_page(&mut self, page: u32) -> SessionResult<()> {
        self.page_size(page)?;
        if page != self.current_page {
            log::debug!("page {} -> {page}", self.current_page);
            self.current_page = page;
        }
        Ok(())
    }

    /// Returns true if navigation succeeded, false if already on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.current_page + 1 < self.page_count() {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Returns true if navigation succeeded, false if already on the first page.
    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 0 && self.is_loaded() {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page + 1 >= self.page_count()
    }

    /// Build the preview of the current page and keep it as the current frame.
    pub fn refresh_preview(&mut self) -> SessionResult<&PreviewFrame> {
        let handle = self.handle().ok_or(SessionError::NoDocument)?;
        let page = self.current_page;
        let size = self.page_size(page)?;

        let ticket = self.tracker.begin(OperationKind::Preview)?;
        let result = self.engine.extract_page(handle, page);
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) => {
                self.tracker.finish(ticket);
                return Err(err.into());
            }
        };

        let frame = PreviewFrame { page, generation: ticket.generation(), size, bytes };
        if !self.apply_preview(ticket, frame) {
            return Err(SessionError::Superseded(OperationKind::Preview));
        }
        self.preview.as_ref().ok_or(SessionError::NoDocument)
    }

    /// Accept a preview produced under `ticket`, unless something newer has
    /// started since. Returns whether the frame was kept.
    pub fn apply_preview(&mut self, ticket: OperationTicket, frame: PreviewFrame) -> bool {
        if !self.tracker.finish(ticket) {
            return false;
        }
        self.preview = Some(frame);
        true
    }

    pub fn preview(&self) -> Option<&PreviewFrame> {
        self.preview.as_ref()
    }

    /// Run `f` on a fresh editable copy of the loaded document. The loaded
    /// document itself is never modified.
    pub fn export_with<T>(&mut self, f: impl FnOnce(E::Editor) -> ExportResult<T>) -> ExportResult<T> {
        let handle = self.handle().ok_or(SessionError::NoDocument)?;
        let ticket = self.tracker.begin(OperationKind::Export)?;

        let result = self.engine.edit(handle).map_err(ExportError::from).and_then(f);
        let current = self.tracker.finish(ticket);

        let value = result?;
        if !current {
            return Err(SessionError::Superseded(OperationKind::Export).into());
        }
        Ok(value)
    }

    pub fn export_file_name(&self) -> String {
        annotated_file_name(self.source_name())
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// For hosts that run previews or exports off the event loop and need to
    /// begin and finish tickets themselves.
    pub fn tracker_mut(&mut self) -> &mut OperationTracker {
        &mut self.tracker
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// `report.pdf` becomes `report-annotated.pdf`; no name gives `annotated.pdf`.
pub fn annotated_file_name(source: Option<&str>) -> String {
    source
        .map(Path::new)
        .and_then(Path::file_stem)
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.trim().is_empty())
        .map(|stem| format!("{stem}-annotated.pdf"))
        .unwrap_or_else(|| DEFAULT_EXPORT_NAME.to_owned())
}
