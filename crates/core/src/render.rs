//! Overlay rendering.
//!
//! The overlay is a transparent raster layer the host composites over the page
//! preview. It always matches the preview's pixel size so capture coordinates
//! and painted coordinates are the same numbers.

use crate::annotation::{Color, Point};
use crate::config::EngineConfig;
use crate::error::RenderError;
use crate::layout::{self, RenderTarget, Shape};
use crate::mapper::SurfaceSize;
use crate::store::AnnotationStore;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Raster layer sized to the preview. A zero-sized surface holds no pixmap and
/// every draw on it is a no-op.
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    size: SurfaceSize,
    pixmap: Option<Pixmap>,
}

impl OverlaySurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self { size, pixmap: Pixmap::new(size.width, size.height) }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Reallocate for a new size. Returns `false` when the size is unchanged.
    pub fn resize(&mut self, size: SurfaceSize) -> bool {
        if size == self.size {
            return false;
        }
        log::debug!("overlay resized {}x{} -> {}x{}", self.size.width, self.size.height, size.width, size.height);
        *self = Self::new(size);
        true
    }

    pub fn clear(&mut self) {
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill(tiny_skia::Color::TRANSPARENT);
        }
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight (non-premultiplied) RGBA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap
            .as_ref()
            .map_or(true, |pixmap| pixmap.pixels().iter().all(|pixel| pixel.alpha() == 0))
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let pixmap = self.pixmap.as_ref().ok_or(RenderError::EmptySurface)?;
        pixmap.encode_png().map_err(|err| RenderError::Encode(err.to_string()))
    }

    /// Paint one shape. Returns whether anything was drawn.
    fn draw(&mut self, shape: &Shape<'_>) -> bool {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return false;
        };

        match shape {
            Shape::FillRect { rect, color, alpha } => {
                let Some(rect) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
                    return false;
                };
                pixmap.fill_rect(rect, &paint(*color, *alpha), Transform::identity(), None);
                true
            }
            Shape::Polyline { points, color, alpha, width } => {
                let Some(path) = build_path(points, false) else {
                    return false;
                };
                let stroke = Stroke {
                    width: *width,
                    line_cap: LineCap::Round,
                    line_join: LineJoin::Round,
                    ..Default::default()
                };
                pixmap.stroke_path(&path, &paint(*color, *alpha), &stroke, Transform::identity(), None);
                true
            }
            Shape::FillPolygon { points, color, alpha } => {
                let Some(path) = build_path(points, true) else {
                    return false;
                };
                pixmap.fill_path(&path, &paint(*color, *alpha), FillRule::Winding, Transform::identity(), None);
                true
            }
            // Text is never rasterized into the preview overlay.
            Shape::Label { .. } => false,
        }
    }
}

fn paint(color: Color, alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8);
    paint.anti_alias = true;
    paint
}

fn build_path(points: &[Point], close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    for point in rest {
        pb.line_to(point.x, point.y);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

/// Result of one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderReport {
    pub page: u32,
    /// Committed annotations painted
    pub annotations: usize,
    /// Points of the live stroke painted on top, zero when none
    pub live_points: usize,
}

#[derive(Debug, Clone)]
pub struct RenderPipeline {
    overlay: OverlaySurface,
}

impl RenderPipeline {
    pub fn new(size: SurfaceSize) -> Self {
        Self { overlay: OverlaySurface::new(size) }
    }

    pub fn overlay(&self) -> &OverlaySurface {
        &self.overlay
    }

    pub fn resize(&mut self, size: SurfaceSize) -> bool {
        self.overlay.resize(size)
    }

    /// Clear the overlay, then paint `page` in store order, then the live
    /// stroke on top. Never touches the store.
    pub fn render(
        &mut self,
        page: u32,
        store: &AnnotationStore,
        live: Option<(&[Point], Color)>,
        config: &EngineConfig,
    ) -> RenderReport {
        self.overlay.clear();

        let annotations = store.get(page);
        for annotation in annotations {
            for shape in layout::shapes_for(annotation, config, RenderTarget::Preview) {
                self.overlay.draw(&shape);
            }
        }

        let mut live_points = 0;
        if let Some((points, color)) = live {
            if let Some(shape) = layout::live_stroke(points, color, config) {
                self.overlay.draw(&shape);
                live_points = points.len();
            }
        }

        log::trace!("rendered page {page}: {} annotation(s), {live_points} live point(s)", annotations.len());
        RenderReport { page, annotations: annotations.len(), live_points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;

    fn letter() -> SurfaceSize {
        SurfaceSize::new(612, 792)
    }

    #[test]
    fn highlight_paints_translucent_footprint() {
        let mut store = AnnotationStore::new();
        store.append(0, Annotation::highlight(Point::new(150.0, 100.0), Color::RED));

        let mut pipeline = RenderPipeline::new(letter());
        let report = pipeline.render(0, &store, None, &EngineConfig::default());
        assert_eq!(report.annotations, 1);

        let [r, g, b, a] = pipeline.overlay().pixel(150, 100).unwrap();
        assert!(r >= 250 && g == 0 && b == 0, "color ({r}, {g}, {b})");
        assert!((126..=130).contains(&a), "alpha {a}");

        assert_eq!(pipeline.overlay().pixel(150, 130).unwrap()[3], 0);
        assert_eq!(pipeline.overlay().pixel(210, 100).unwrap()[3], 0);
    }

    #[test]
    fn later_annotations_paint_on_top() {
        let mut store = AnnotationStore::new();
        store.append(0, Annotation::highlight(Point::new(50.0, 50.0), Color::RED));
        store.append(0, Annotation::highlight(Point::new(50.0, 50.0), Color::BLUE));

        let mut pipeline = RenderPipeline::new(letter());
        pipeline.render(0, &store, None, &EngineConfig::default());

        let [r, _, b, _] = pipeline.overlay().pixel(50, 50).unwrap();
        assert!(b > r, "blue should dominate, got r={r} b={b}");
    }

    #[test]
    fn render_clears_previous_frame() {
        let mut store = AnnotationStore::new();
        store.append(0, Annotation::highlight(Point::new(50.0, 50.0), Color::RED));

        let mut pipeline = RenderPipeline::new(letter());
        pipeline.render(0, &store, None, &EngineConfig::default());
        assert!(!pipeline.overlay().is_blank());

        pipeline.render(1, &store, None, &EngineConfig::default());
        assert!(pipeline.overlay().is_blank());
    }

    #[test]
    fn live_stroke_is_drawn_without_touching_store() {
        let store = AnnotationStore::new();
        let live = [Point::new(10.0, 10.0), Point::new(60.0, 10.0)];

        let mut pipeline = RenderPipeline::new(letter());
        let report = pipeline.render(0, &store, Some((&live, Color::BLACK)), &EngineConfig::default());

        assert_eq!(report.live_points, 2);
        assert_eq!(pipeline.overlay().pixel(35, 10).unwrap()[3], 255);
        assert!(store.is_empty());
    }

    #[test]
    fn comment_preview_draws_marker_only() {
        let mut store = AnnotationStore::new();
        store.append(0, Annotation::comment(Point::new(100.0, 100.0), Color::BLUE, "text").unwrap());

        let mut pipeline = RenderPipeline::new(letter());
        pipeline.render(0, &store, None, &EngineConfig::default());

        // Inside the bubble body, then where the label would be in an export.
        assert_eq!(pipeline.overlay().pixel(107, 92).unwrap(), [0, 0, 255, 255]);
        assert_eq!(pipeline.overlay().pixel(125, 94).unwrap()[3], 0);
    }

    #[test]
    fn zero_size_surface_is_a_no_op() {
        let mut store = AnnotationStore::new();
        store.append(0, Annotation::highlight(Point::new(1.0, 1.0), Color::RED));

        let mut pipeline = RenderPipeline::new(SurfaceSize::new(0, 0));
        pipeline.render(0, &store, None, &EngineConfig::default());

        assert!(pipeline.overlay().pixmap().is_none());
        assert!(pipeline.overlay().is_blank());
        assert!(matches!(pipeline.overlay().encode_png(), Err(RenderError::EmptySurface)));
    }

    #[test]
    fn resize_reallocates_only_on_change() {
        let mut pipeline = RenderPipeline::new(letter());
        assert!(!pipeline.resize(letter()));
        assert!(pipeline.resize(SurfaceSize::new(300, 400)));

        let pixmap = pipeline.overlay().pixmap().unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (300, 400));
    }

    #[test]
    fn encodes_png() {
        let pipeline = RenderPipeline::new(SurfaceSize::new(4, 4));
        let png = pipeline.overlay().encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
