//! Annotation data model
//!
//! Annotations are immutable once committed. Every position is stored in
//! preview surface pixels (origin top-left, y grows downward) exactly as it was
//! captured; page space is derived on demand by [`crate::mapper`].

use std::fmt;

/// Position on the preview surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// RGB color with an optional explicit alpha.
///
/// When `alpha` is `None` each annotation kind applies its own default:
/// translucent for highlight and underline, opaque for comments and
/// signatures.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: Option<f32>,
}

impl Color {
    /// Create a color without an explicit alpha
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: None }
    }

    /// Same color with an explicit alpha, clamped to `0.0..=1.0`
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha: Some(alpha.clamp(0.0, 1.0)), ..self }
    }

    /// Explicit alpha, or `default` when none was chosen
    pub fn alpha_or(&self, default: f32) -> f32 {
        self.alpha.unwrap_or(default)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.trim().trim_start_matches('#');
        if !digits.is_ascii() {
            return None;
        }
        let channel = |index: usize| u8::from_str_radix(digits.get(index..index + 2)?, 16).ok();

        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(
                Self::rgb(channel(0)?, channel(2)?, channel(4)?)
                    .with_alpha(f32::from(channel(6)?) / 255.0),
            ),
            _ => None,
        }
    }

    pub fn to_pdf(&self) -> pdf_engine::RgbColor {
        pdf_engine::RgbColor::from_rgb8(self.r, self.g, self.b)
    }
}

/// Common annotation colors
impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, alpha: None };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0, alpha: None };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, alpha: None };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0, alpha: None };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, alpha: None };
}

impl Default for Color {
    fn default() -> Self {
        Self::RED
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)?;
        if let Some(alpha) = self.alpha {
            write!(f, "{:02X}", (alpha * 255.0).round() as u8)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("invalid color {value:?}, expected #RRGGBB"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Annotation tool currently armed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    None,
    Highlight,
    Underline,
    Signature,
    Comment,
}

/// Comment text, guaranteed non-blank. Kept exactly as entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentText(String);

impl CommentText {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signature ink, guaranteed to hold at least two points.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke(Vec<Point>);

impl Stroke {
    pub const MIN_POINTS: usize = 2;

    /// Returns `None` when fewer than [`Stroke::MIN_POINTS`] points were captured.
    pub fn new(points: Vec<Point>) -> Option<Self> {
        (points.len() >= Self::MIN_POINTS).then_some(Self(points))
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn first(&self) -> Point {
        self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// One committed, immutable visual mark.
///
/// Each variant carries only the fields its kind needs, so a comment
/// without text or a signature without ink cannot be built.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Highlight { anchor: Point, color: Color },
    Underline { anchor: Point, color: Color },
    Comment { anchor: Point, color: Color, text: CommentText },
    Signature { anchor: Point, color: Color, stroke: Stroke },
}

/// Discriminant of [`Annotation`], handy for counting and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Highlight,
    Underline,
    Comment,
    Signature,
}

impl Annotation {
    pub fn highlight(anchor: Point, color: Color) -> Self {
        Self::Highlight { anchor, color }
    }

    pub fn underline(anchor: Point, color: Color) -> Self {
        Self::Underline { anchor, color }
    }

    /// `None` when `text` is blank.
    pub fn comment(anchor: Point, color: Color, text: impl Into<String>) -> Option<Self> {
        Some(Self::Comment { anchor, color, text: CommentText::new(text)? })
    }

    /// Anchored at the first captured point. `None` for fewer than two points.
    pub fn signature(color: Color, points: Vec<Point>) -> Option<Self> {
        let stroke = Stroke::new(points)?;
        Some(Self::Signature { anchor: stroke.first(), color, stroke })
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Highlight { .. } => AnnotationKind::Highlight,
            Self::Underline { .. } => AnnotationKind::Underline,
            Self::Comment { .. } => AnnotationKind::Comment,
            Self::Signature { .. } => AnnotationKind::Signature,
        }
    }

    pub fn anchor(&self) -> Point {
        match self {
            Self::Highlight { anchor, .. }
            | Self::Underline { anchor, .. }
            | Self::Comment { anchor, .. }
            | Self::Signature { anchor, .. } => *anchor,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Highlight { color, .. }
            | Self::Underline { color, .. }
            | Self::Comment { color, .. }
            | Self::Signature { color, .. } => *color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("00ff00"), Some(Color::GREEN));

        let translucent = Color::from_hex("#0000FF80").unwrap();
        assert_eq!((translucent.r, translucent.g, translucent.b), (0, 0, 255));
        assert!((translucent.alpha.unwrap() - 0.502).abs() < 0.01);

        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
    }

    #[test]
    fn test_color_display_roundtrip() {
        let color = Color::rgb(18, 52, 86).with_alpha(1.0);
        assert_eq!(color.to_string(), "#123456FF");
        assert_eq!(Color::from_hex(&color.to_string()), Some(color));
    }

    #[test]
    fn test_color_alpha_default() {
        assert_eq!(Color::RED.alpha_or(0.5), 0.5);
        assert_eq!(Color::RED.with_alpha(2.0).alpha_or(0.5), 1.0);
    }

    #[test]
    fn test_comment_requires_text() {
        assert!(Annotation::comment(Point::new(1.0, 1.0), Color::BLUE, "").is_none());
        assert!(Annotation::comment(Point::new(1.0, 1.0), Color::BLUE, "   ").is_none());

        let comment = Annotation::comment(Point::new(1.0, 1.0), Color::BLUE, " looks good ")
            .expect("non-blank text");
        let Annotation::Comment { text, .. } = comment else {
            panic!("expected a comment");
        };
        assert_eq!(text.as_str(), " looks good ");
    }

    #[test]
    fn test_signature_requires_two_points() {
        assert!(Annotation::signature(Color::BLACK, vec![Point::new(1.0, 1.0)]).is_none());

        let signature =
            Annotation::signature(Color::BLACK, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)])
                .expect("two points are enough");
        assert_eq!(signature.anchor(), Point::new(1.0, 2.0));
        assert_eq!(signature.kind(), AnnotationKind::Signature);
    }

    #[test]
    fn test_accessors() {
        let highlight = Annotation::highlight(Point::new(150.0, 100.0), Color::RED);
        assert_eq!(highlight.anchor(), Point::new(150.0, 100.0));
        assert_eq!(highlight.color(), Color::RED);
        assert_eq!(highlight.kind(), AnnotationKind::Highlight);
    }
}
