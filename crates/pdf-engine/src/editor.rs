//! lopdf-backed [`DocumentEditor`].
//!
//! Drawing calls only queue content operations. `save` appends one content
//! stream per touched page, isolated from the page's own graphics state, and
//! registers the graphics states and fonts that stream uses.

use crate::font::{self, EmbeddedFont, FontAsset, FontId};
use crate::{
    inherited, media_box, DocumentEditor, PageSize, Paint, PathPaint, PdfEngineError, Rect,
    RgbColor,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, BTreeSet};

const GRAPHICS_STATE_PREFIX: &str = "AnnotGs";
const FONT_PREFIX: &str = "AnnotF";

#[derive(Debug, Clone)]
struct PageEntry {
    id: ObjectId,
    media_box: Rect,
}

#[derive(Debug, Default)]
struct PendingPage {
    operations: Vec<Operation>,
    graphics_states: BTreeSet<u16>,
    fonts: BTreeSet<u32>,
}

#[derive(Debug, Clone, Copy)]
enum ResourceSlot {
    Inline,
    Indirect(ObjectId),
}

#[derive(Debug)]
pub struct LopdfEditor {
    doc: Document,
    pages_root: ObjectId,
    pages: Vec<PageEntry>,
    pending: BTreeMap<u32, PendingPage>,
    /// Opacity in thousandths -> ExtGState object.
    graphics_states: BTreeMap<u16, ObjectId>,
    fonts: Vec<EmbeddedFont>,
}

impl Default for LopdfEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfEditor {
    /// Start an empty document with no pages.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_root = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_root,
        });
        doc.trailer.set("Root", catalog_id);

        Self {
            doc,
            pages_root,
            pages: Vec::new(),
            pending: BTreeMap::new(),
            graphics_states: BTreeMap::new(),
            fonts: Vec::new(),
        }
    }

    pub(crate) fn from_document(doc: Document) -> Result<Self, PdfEngineError> {
        let pages_root = doc.catalog()?.get(b"Pages").and_then(Object::as_reference)?;
        let pages = doc
            .get_pages()
            .values()
            .map(|id| PageEntry { id: *id, media_box: media_box(&doc, *id) })
            .collect();

        Ok(Self {
            doc,
            pages_root,
            pages,
            pending: BTreeMap::new(),
            graphics_states: BTreeMap::new(),
            fonts: Vec::new(),
        })
    }

    fn page(&self, page_index: u32) -> Result<&PageEntry, PdfEngineError> {
        self.pages.get(page_index as usize).ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    fn queue(&mut self, page_index: u32) -> Result<&mut PendingPage, PdfEngineError> {
        self.page(page_index)?;
        Ok(self.pending.entry(page_index).or_default())
    }

    /// Opacity key for the ExtGState that applies `opacity`, `None` when opaque.
    fn graphics_state(&mut self, opacity: f32) -> Option<u16> {
        let key = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16;
        if key >= 1000 {
            return None;
        }

        let doc = &mut self.doc;
        self.graphics_states.entry(key).or_insert_with(|| {
            let alpha = f32::from(key) / 1000.0;
            doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "CA" => alpha,
                "ca" => alpha,
            })
        });
        Some(key)
    }

    fn begin_paint(&mut self, page_index: u32, opacity: f32) -> Result<Vec<Operation>, PdfEngineError> {
        self.page(page_index)?;
        let mut operations = vec![Operation::new("q", vec![])];
        if let Some(key) = self.graphics_state(opacity) {
            self.queue(page_index)?.graphics_states.insert(key);
            operations.push(Operation::new("gs", vec![graphics_state_name(key).into()]));
        }
        Ok(operations)
    }

    fn commit(&mut self, page_index: u32, mut operations: Vec<Operation>) -> Result<(), PdfEngineError> {
        operations.push(Operation::new("Q", vec![]));
        self.queue(page_index)?.operations.extend(operations);
        Ok(())
    }
}

fn graphics_state_name(key: u16) -> String {
    format!("{GRAPHICS_STATE_PREFIX}{key}")
}

fn color_operation(operator: &str, color: RgbColor) -> Operation {
    Operation::new(operator, vec![color.r.into(), color.g.into(), color.b.into()])
}

fn point_operation(operator: &str, (x, y): (f32, f32)) -> Operation {
    Operation::new(operator, vec![x.into(), y.into()])
}

impl DocumentEditor for LopdfEditor {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        let media_box = self.page(page_index)?.media_box;
        Ok(PageSize { width_pt: media_box.width, height_pt: media_box.height })
    }

    fn add_page(&mut self, size: PageSize) -> Result<u32, PdfEngineError> {
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_root,
            "MediaBox" => vec![0.into(), 0.into(), size.width_pt.into(), size.height_pt.into()],
            "Resources" => Dictionary::new(),
            "Contents" => content_id,
        });

        let root = self.doc.get_dictionary_mut(self.pages_root)?;
        root.get_mut(b"Kids")?.as_array_mut()?.push(page_id.into());
        let count = root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        root.set("Count", count + 1);

        self.pages.push(PageEntry {
            id: page_id,
            media_box: Rect { x: 0.0, y: 0.0, width: size.width_pt, height: size.height_pt },
        });
        Ok(self.pages.len() as u32 - 1)
    }

    fn embed_font(&mut self, asset: &FontAsset, coverage: &str) -> Result<FontId, PdfEngineError> {
        let id = FontId(self.fonts.len() as u32);
        let embedded = font::embed(&mut self.doc, asset, coverage, format!("{FONT_PREFIX}{}", id.0))?;
        self.fonts.push(embedded);
        Ok(id)
    }

    fn draw_rectangle(
        &mut self,
        page_index: u32,
        rect: Rect,
        paint: Paint,
    ) -> Result<(), PdfEngineError> {
        let mut operations = self.begin_paint(page_index, paint.opacity)?;
        operations.push(color_operation("rg", paint.color));
        operations.push(Operation::new(
            "re",
            vec![rect.x.into(), rect.y.into(), rect.width.into(), rect.height.into()],
        ));
        operations.push(Operation::new("f", vec![]));
        self.commit(page_index, operations)
    }

    fn draw_path(
        &mut self,
        page_index: u32,
        points: &[(f32, f32)],
        paint: PathPaint,
    ) -> Result<(), PdfEngineError> {
        let (first, rest) = match points.split_first() {
            Some((first, rest)) if !rest.is_empty() => (*first, rest),
            _ => return Err(PdfEngineError::Backend("path needs at least two points".to_owned())),
        };

        let opacity = match paint {
            PathPaint::Stroke { paint, .. } | PathPaint::Fill { paint } => paint.opacity,
        };
        let mut operations = self.begin_paint(page_index, opacity)?;

        match paint {
            PathPaint::Stroke { paint, width } => {
                operations.push(color_operation("RG", paint.color));
                operations.push(Operation::new("w", vec![width.into()]));
                operations.push(Operation::new("J", vec![1.into()]));
                operations.push(Operation::new("j", vec![1.into()]));
            }
            PathPaint::Fill { paint } => operations.push(color_operation("rg", paint.color)),
        }

        operations.push(point_operation("m", first));
        operations.extend(rest.iter().map(|point| point_operation("l", *point)));

        match paint {
            PathPaint::Stroke { .. } => operations.push(Operation::new("S", vec![])),
            PathPaint::Fill { .. } => {
                operations.push(Operation::new("h", vec![]));
                operations.push(Operation::new("f", vec![]));
            }
        }
        self.commit(page_index, operations)
    }

    fn draw_text(
        &mut self,
        page_index: u32,
        font: FontId,
        origin: (f32, f32),
        size: f32,
        color: RgbColor,
        text: &str,
    ) -> Result<usize, PdfEngineError> {
        let embedded =
            self.fonts.get(font.0 as usize).ok_or(PdfEngineError::UnknownFont(font.0))?;
        let font_name = embedded.resource_name.clone();
        let (encoded, missing) = embedded.encode(text);
        if missing > 0 {
            log::warn!("{font_name} cannot draw {missing} character(s) of {text:?}, substituting");
        }

        let mut operations = self.begin_paint(page_index, 1.0)?;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec![font_name.into(), size.into()]));
        operations.push(color_operation("rg", color));
        operations.push(point_operation("Td", origin));
        operations.push(Operation::new("Tj", vec![encoded]));
        operations.push(Operation::new("ET", vec![]));

        self.queue(page_index)?.fonts.insert(font.0);
        self.commit(page_index, operations)?;
        Ok(missing)
    }

    fn save(mut self) -> Result<Vec<u8>, PdfEngineError> {
        let pending = std::mem::take(&mut self.pending);
        for (page_index, page) in pending {
            if page.operations.is_empty() {
                continue;
            }
            let entry = self.page(page_index)?.clone();

            for key in &page.graphics_states {
                let target = self.graphics_states[key];
                register_resource(&mut self.doc, entry.id, "ExtGState", &graphics_state_name(*key), target)?;
            }
            for font in &page.fonts {
                let embedded = &self.fonts[*font as usize];
                let (name, target) = (embedded.resource_name.clone(), embedded.object_id);
                register_resource(&mut self.doc, entry.id, "Font", &name, target)?;
            }

            let mut operations = Vec::with_capacity(page.operations.len() + 3);
            operations.push(Operation::new("q", vec![]));
            if entry.media_box.x != 0.0 || entry.media_box.y != 0.0 {
                operations.push(Operation::new(
                    "cm",
                    vec![
                        1.into(),
                        0.into(),
                        0.into(),
                        1.into(),
                        entry.media_box.x.into(),
                        entry.media_box.y.into(),
                    ],
                ));
            }
            operations.extend(page.operations);
            operations.push(Operation::new("Q", vec![]));

            append_isolated_content(&mut self.doc, entry.id, operations)?;
        }

        self.doc.compress();
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Append `operations` after the page's existing content, bracketing the
/// existing streams in `q`/`Q` so whatever state they leave behind is undone.
fn append_isolated_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), PdfEngineError> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut appended = Vec::with_capacity(operations.len() + 1);
    if !existing.is_empty() {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
        appended.push(Operation::new("Q", vec![]));
    }
    appended.extend(operations);

    let data = Content { operations: appended }.encode()?;
    let appended_id = doc.add_object(Stream::new(Dictionary::new(), data));
    contents.push(Object::Reference(appended_id));

    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

/// Make sure the page carries its own resource dictionary, copying an
/// inherited one down so additions do not hide the inherited entries.
fn resource_slot(doc: &mut Document, page_id: ObjectId) -> Result<ResourceSlot, PdfEngineError> {
    let current = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => Some(ResourceSlot::Indirect(*id)),
        Ok(Object::Dictionary(_)) => Some(ResourceSlot::Inline),
        _ => None,
    };
    if let Some(slot) = current {
        return Ok(slot);
    }

    let resources = inherited(doc, page_id, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    doc.get_dictionary_mut(page_id)?.set("Resources", resources);
    Ok(ResourceSlot::Inline)
}

fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), PdfEngineError> {
    let slot = resource_slot(doc, page_id)?;

    let mut entries = {
        let resources = match slot {
            ResourceSlot::Indirect(id) => doc.get_dictionary(id)?,
            ResourceSlot::Inline => doc.get_dictionary(page_id)?.get(b"Resources")?.as_dict()?,
        };
        match resources.get(category.as_bytes()) {
            Ok(object) => doc.dereference(object)?.1.as_dict()?.clone(),
            Err(_) => Dictionary::new(),
        }
    };
    entries.set(name, target);

    let resources = match slot {
        ResourceSlot::Indirect(id) => doc.get_dictionary_mut(id)?,
        ResourceSlot::Inline => doc.get_dictionary_mut(page_id)?.get_mut(b"Resources")?.as_dict_mut()?,
    };
    resources.set(category, entries);
    Ok(())
}
