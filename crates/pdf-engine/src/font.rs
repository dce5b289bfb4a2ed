//! Font embedding for text drawn into exported pages.

use crate::PdfEngineError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as FmtWrite;
use ttf_parser::{name_id, Face, GlyphId};

/// Handle to a font embedded through [`crate::DocumentEditor::embed_font`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub(crate) u32);

impl FontId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Base-14 fonts every conforming reader ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    Courier,
}

impl StandardFont {
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }
}

/// Font resource supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontAsset {
    /// Referenced by name, WinAnsi encoded, nothing embedded.
    Standard(StandardFont),
    /// Raw TrueType/OpenType (glyf) bytes, embedded as a CID font so any glyph
    /// in the face is reachable.
    TrueType(Vec<u8>),
}

#[derive(Debug, Clone)]
pub(crate) enum FontEncoding {
    WinAnsi,
    Identity { glyphs: HashMap<char, u16> },
}

#[derive(Debug, Clone)]
pub(crate) struct EmbeddedFont {
    pub(crate) object_id: ObjectId,
    pub(crate) resource_name: String,
    pub(crate) encoding: FontEncoding,
}

impl EmbeddedFont {
    /// Encode `text` as a show-text operand for this font, together with the
    /// number of characters the font cannot draw. WinAnsi fonts substitute
    /// `?` for those, CID fonts draw `.notdef`.
    pub(crate) fn encode(&self, text: &str) -> (Object, usize) {
        let mut missing = 0;
        let bytes = match &self.encoding {
            FontEncoding::WinAnsi => text
                .chars()
                .map(|ch| match ch as u32 {
                    code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
                    _ => {
                        missing += 1;
                        b'?'
                    }
                })
                .collect(),
            FontEncoding::Identity { glyphs } => text
                .chars()
                .flat_map(|ch| {
                    let gid = glyphs.get(&ch).copied().unwrap_or(0);
                    if gid == 0 {
                        missing += 1;
                    }
                    gid.to_be_bytes()
                })
                .collect(),
        };
        (Object::String(bytes, StringFormat::Hexadecimal), missing)
    }
}

pub(crate) fn embed(
    doc: &mut Document,
    asset: &FontAsset,
    coverage: &str,
    resource_name: String,
) -> Result<EmbeddedFont, PdfEngineError> {
    match asset {
        FontAsset::Standard(font) => {
            let object_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            Ok(EmbeddedFont { object_id, resource_name, encoding: FontEncoding::WinAnsi })
        }
        FontAsset::TrueType(data) => embed_truetype(doc, data, coverage, resource_name),
    }
}

fn embed_truetype(
    doc: &mut Document,
    data: &[u8],
    coverage: &str,
    resource_name: String,
) -> Result<EmbeddedFont, PdfEngineError> {
    let face = Face::parse(data, 0).map_err(|err| PdfEngineError::Font(err.to_string()))?;
    let units_per_em = f32::from(face.units_per_em().max(1));
    let scale = |value: f32| (value * 1000.0 / units_per_em).round();

    let mut glyphs = HashMap::new();
    let mut used: BTreeMap<u16, char> = BTreeMap::new();
    for ch in coverage.chars() {
        if glyphs.contains_key(&ch) {
            continue;
        }
        match face.glyph_index(ch) {
            Some(GlyphId(gid)) => {
                glyphs.insert(ch, gid);
                used.entry(gid).or_insert(ch);
            }
            None => log::warn!("font has no glyph for {ch:?}, drawing .notdef"),
        }
    }

    let base_font = postscript_name(&face);

    let mut widths = Vec::with_capacity(used.len() * 2);
    for gid in used.keys() {
        let advance = face.glyph_hor_advance(GlyphId(*gid)).unwrap_or(0);
        widths.push(Object::Integer(i64::from(*gid)));
        widths.push(Object::Array(vec![Object::Real(scale(f32::from(advance)))]));
    }

    let bbox = face.global_bounding_box();
    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => data.len() as i64 },
        data.to_vec(),
    ));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base_font.as_str(),
        "Flags" => 32,
        "FontBBox" => vec![
            scale(f32::from(bbox.x_min)).into(),
            scale(f32::from(bbox.y_min)).into(),
            scale(f32::from(bbox.x_max)).into(),
            scale(f32::from(bbox.y_max)).into(),
        ],
        "ItalicAngle" => face.italic_angle().unwrap_or(0.0),
        "Ascent" => scale(f32::from(face.ascender())),
        "Descent" => scale(f32::from(face.descender())),
        "CapHeight" => scale(f32::from(face.capital_height().unwrap_or(face.ascender()))),
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => base_font.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });
    let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(&used)));
    let object_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => base_font.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![cid_font_id.into()],
        "ToUnicode" => to_unicode_id,
    });

    log::debug!("embedded {base_font} covering {} glyph(s)", used.len());
    Ok(EmbeddedFont { object_id, resource_name, encoding: FontEncoding::Identity { glyphs } })
}

fn postscript_name(face: &Face<'_>) -> String {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .map(|name| name.chars().filter(|ch| ch.is_ascii_graphic() && !"[]()<>{}/%#".contains(*ch)).collect::<String>())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "EmbeddedFont".to_owned())
}

fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    // bfchar sections are limited to 100 entries each.
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, ch) in chunk {
            let mut units = [0u16; 2];
            let hex: String =
                ch.encode_utf16(&mut units).iter().map(|unit| format!("{unit:04X}")).collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{hex}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}
