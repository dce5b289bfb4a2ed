//! Geometry of each annotation kind, in surface space.
//!
//! Both the overlay renderer and the PDF exporter draw from these shapes, so
//! a mark lands in the same place on screen and in the output. The exporter
//! maps them through [`crate::mapper::PageCoordinateMapper`].
//!
//! Comments: the speech-bubble marker is drawn everywhere, the text label
//! only in exported documents.

use crate::annotation::{Annotation, Color, Point};
use crate::config::EngineConfig;
use crate::mapper::SurfaceRect;

/// Opacity of comment markers and signatures without an explicit alpha.
pub const OPAQUE: f32 = 1.0;

/// Gap between the comment marker and its exported text.
const LABEL_GAP: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Preview,
    Export,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape<'a> {
    FillRect { rect: SurfaceRect, color: Color, alpha: f32 },
    Polyline { points: &'a [Point], color: Color, alpha: f32, width: f32 },
    FillPolygon { points: Vec<Point>, color: Color, alpha: f32 },
    /// Single line of text; `origin` is the start of the baseline.
    Label { origin: Point, size: f32, color: Color, text: &'a str },
}

pub fn shapes_for<'a>(
    annotation: &'a Annotation,
    config: &EngineConfig,
    target: RenderTarget,
) -> Vec<Shape<'a>> {
    match annotation {
        Annotation::Highlight { anchor, color } => vec![Shape::FillRect {
            rect: SurfaceRect::centered(*anchor, config.highlight_width, config.highlight_height),
            color: *color,
            alpha: color.alpha_or(config.markup_alpha),
        }],
        Annotation::Underline { anchor, color } => vec![Shape::FillRect {
            rect: SurfaceRect {
                x: anchor.x - config.underline_width / 2.0,
                y: anchor.y + config.underline_offset,
                width: config.underline_width,
                height: config.underline_height,
            },
            color: *color,
            alpha: color.alpha_or(config.markup_alpha),
        }],
        Annotation::Comment { anchor, color, text } => {
            let size = config.comment_marker_size;
            let alpha = color.alpha_or(OPAQUE);
            let mut shapes = vec![Shape::FillPolygon {
                points: comment_marker(*anchor, size),
                color: *color,
                alpha,
            }];
            if target == RenderTarget::Export {
                shapes.push(Shape::Label {
                    origin: Point::new(anchor.x + size + LABEL_GAP, anchor.y - 0.3 * size),
                    size: config.comment_text_size,
                    color: *color,
                    text: text.as_str(),
                });
            }
            shapes
        }
        Annotation::Signature { color, stroke, .. } => vec![Shape::Polyline {
            points: stroke.points(),
            color: *color,
            alpha: color.alpha_or(OPAQUE),
            width: config.signature_width,
        }],
    }
}

/// Ink for a stroke that is still being drawn. Nothing until it has a segment.
pub fn live_stroke<'a>(points: &'a [Point], color: Color, config: &EngineConfig) -> Option<Shape<'a>> {
    (points.len() >= 2).then_some(Shape::Polyline {
        points,
        color,
        alpha: color.alpha_or(OPAQUE),
        width: config.signature_width,
    })
}

/// Speech bubble sitting above and to the right of `anchor`, its tail
/// pointing down at the anchor row.
fn comment_marker(anchor: Point, size: f32) -> Vec<Point> {
    let Point { x, y } = anchor;
    let body_bottom = y - 0.3 * size;
    vec![
        Point::new(x, y - size),
        Point::new(x + size, y - size),
        Point::new(x + size, body_bottom),
        Point::new(x + 0.5 * size, body_bottom),
        Point::new(x + 0.15 * size, y),
        Point::new(x + 0.2 * size, body_bottom),
        Point::new(x, body_bottom),
    ]
}
