//! Preview surface space to PDF page space.
//!
//! Surface space has its origin at the top-left corner with y growing
//! downward; page space has its origin at the bottom-left with y growing
//! upward. [`to_page_point`] is the only place the flip is written down,
//! everything else in the crate goes through it.

use crate::annotation::Point;
use std::cell::Cell;
use std::rc::Rc;

/// Pixel dimensions of a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Handle to the visible page preview.
///
/// The overlay is always resized to whatever this reports, so capture and
/// rendering share one pixel grid.
pub trait PreviewSurface {
    fn rendered_size(&self) -> SurfaceSize;
}

impl PreviewSurface for SurfaceSize {
    fn rendered_size(&self) -> SurfaceSize {
        *self
    }
}

impl PreviewSurface for Cell<SurfaceSize> {
    fn rendered_size(&self) -> SurfaceSize {
        self.get()
    }
}

impl<T: PreviewSurface + ?Sized> PreviewSurface for Rc<T> {
    fn rendered_size(&self) -> SurfaceSize {
        (**self).rendered_size()
    }
}

/// Rectangle in surface space, `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    /// Rectangle of the given size centered on `center`.
    pub fn centered(center: Point, width: f32, height: f32) -> Self {
        Self { x: center.x - width / 2.0, y: center.y - height / 2.0, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Flip a surface point into page space. `page_height` must be the exact
/// height of the destination page.
pub fn to_page_point(p: Point, page_height: f32) -> Point {
    Point { x: p.x, y: page_height - p.y }
}

/// Mapper bound to one destination page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCoordinateMapper {
    page_height: f32,
}

impl PageCoordinateMapper {
    pub fn new(page_height: f32) -> Self {
        Self { page_height }
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    pub fn to_page_point(&self, p: Point) -> Point {
        to_page_point(p, self.page_height)
    }

    /// Inverse of [`Self::to_page_point`]. The flip is its own inverse.
    pub fn to_surface_point(&self, p: Point) -> Point {
        to_page_point(p, self.page_height)
    }

    /// Page-space rectangle covering `rect`: the surface bottom edge becomes
    /// the page-space origin corner.
    pub fn to_page_rect(&self, rect: SurfaceRect) -> pdf_engine::Rect {
        let origin = self.to_page_point(Point::new(rect.x, rect.bottom()));
        pdf_engine::Rect { x: origin.x, y: origin.y, width: rect.width, height: rect.height }
    }

    pub fn to_page_points(&self, points: &[Point]) -> Vec<(f32, f32)> {
        points
            .iter()
            .map(|p| {
                let page = self.to_page_point(*p);
                (page.x, page.y)
            })
            .collect()
    }
}
