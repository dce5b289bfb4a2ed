//! Engine configuration: annotation footprints, opacity, stroke width and the
//! comment font.
//!
//! Configuration can be loaded from a TOML file, environment variables, or
//! created programmatically. Every field has a default so partial files are
//! accepted.

use crate::annotation::Color;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Sizes are in preview surface pixels; they are carried unchanged into page
/// space on export so preview and output share one footprint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Highlight rectangle width, centered horizontally on the anchor
    pub highlight_width: f32,
    /// Highlight rectangle height, centered vertically on the anchor
    pub highlight_height: f32,
    /// Underline bar width, centered horizontally on the anchor
    pub underline_width: f32,
    /// Underline bar thickness
    pub underline_height: f32,
    /// Distance from the anchor down to the top edge of the underline bar
    pub underline_offset: f32,
    /// Alpha for highlight and underline when the color has none
    pub markup_alpha: f32,
    /// Signature stroke width
    pub signature_width: f32,
    /// Edge length of the comment marker
    pub comment_marker_size: f32,
    /// Font size of exported comment text
    pub comment_text_size: f32,
    /// Color selected when a session starts
    pub default_color: Color,
    /// TrueType font embedded for comments; Helvetica when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            highlight_width: 100.0,
            highlight_height: 20.0,
            underline_width: 100.0,
            underline_height: 3.0,
            underline_offset: 5.0,
            markup_alpha: 0.5,
            signature_width: 2.0,
            comment_marker_size: 14.0,
            comment_text_size: 12.0,
            default_color: Color::RED,
            font_path: None,
        }
    }
}

impl EngineConfig {
    /// Sets the highlight footprint.
    pub fn with_highlight_size(mut self, width: f32, height: f32) -> Self {
        self.highlight_width = width;
        self.highlight_height = height;
        self
    }

    /// Sets the underline footprint and its offset below the anchor.
    pub fn with_underline(mut self, width: f32, height: f32, offset: f32) -> Self {
        self.underline_width = width;
        self.underline_height = height;
        self.underline_offset = offset;
        self
    }

    pub fn with_markup_alpha(mut self, alpha: f32) -> Self {
        self.markup_alpha = alpha;
        self
    }

    pub fn with_signature_width(mut self, width: f32) -> Self {
        self.signature_width = width;
        self
    }

    pub fn with_comment_sizes(mut self, marker: f32, text: f32) -> Self {
        self.comment_marker_size = marker;
        self.comment_text_size = text;
        self
    }

    pub fn with_default_color(mut self, color: Color) -> Self {
        self.default_color = color;
        self
    }

    /// Sets the TrueType font embedded for comment text.
    pub fn with_font_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.font_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Loads configuration from environment variables on top of the defaults.
    ///
    /// Environment variables:
    /// - `PDF_ANNOTATOR_MARKUP_ALPHA`: highlight/underline alpha (default: 0.5)
    /// - `PDF_ANNOTATOR_SIGNATURE_WIDTH`: signature stroke width (default: 2.0)
    /// - `PDF_ANNOTATOR_COMMENT_TEXT_SIZE`: exported comment font size (default: 12)
    /// - `PDF_ANNOTATOR_DEFAULT_COLOR`: initial color as `#RRGGBB` (default: #FF0000)
    /// - `PDF_ANNOTATOR_FONT_PATH`: TrueType font for comments
    ///
    /// # Errors
    /// Returns an error if any variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(alpha) = env_value("PDF_ANNOTATOR_MARKUP_ALPHA", |val| val.parse().ok())? {
            config.markup_alpha = alpha;
        }
        if let Some(width) = env_value("PDF_ANNOTATOR_SIGNATURE_WIDTH", |val| val.parse().ok())? {
            config.signature_width = width;
        }
        if let Some(size) = env_value("PDF_ANNOTATOR_COMMENT_TEXT_SIZE", |val| val.parse().ok())? {
            config.comment_text_size = size;
        }
        if let Some(color) = env_value("PDF_ANNOTATOR_DEFAULT_COLOR", Color::from_hex)? {
            config.default_color = color;
        }
        if let Ok(path) = std::env::var("PDF_ANNOTATOR_FONT_PATH") {
            config.font_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// highlight_width = 100.0
    /// highlight_height = 20.0
    /// markup_alpha = 0.4
    /// default_color = "#FFFF00"
    /// font_path = "/usr/share/fonts/NotoSans-Regular.ttf"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string. Missing keys keep their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Rejects footprints that could not be drawn and alphas outside `0..=1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("highlight_width", self.highlight_width),
            ("highlight_height", self.highlight_height),
            ("underline_width", self.underline_width),
            ("underline_height", self.underline_height),
            ("signature_width", self.signature_width),
            ("comment_marker_size", self.comment_marker_size),
            ("comment_text_size", self.comment_text_size),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue(key.to_string()));
            }
        }
        if !self.underline_offset.is_finite() {
            return Err(ConfigError::InvalidValue("underline_offset".to_string()));
        }
        if !(0.0..=1.0).contains(&self.markup_alpha) {
            return Err(ConfigError::InvalidValue("markup_alpha".to_string()));
        }
        Ok(())
    }
}

fn env_value<T>(name: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => parse(val.trim()).map(Some).ok_or_else(|| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: [&str; 5] = [
        "PDF_ANNOTATOR_MARKUP_ALPHA",
        "PDF_ANNOTATOR_SIGNATURE_WIDTH",
        "PDF_ANNOTATOR_COMMENT_TEXT_SIZE",
        "PDF_ANNOTATOR_DEFAULT_COLOR",
        "PDF_ANNOTATOR_FONT_PATH",
    ];

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in var_names {
                env::remove_var(name);
            }
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!((config.highlight_width, config.highlight_height), (100.0, 20.0));
        assert_eq!((config.underline_width, config.underline_height), (100.0, 3.0));
        assert_eq!(config.underline_offset, 5.0);
        assert_eq!(config.markup_alpha, 0.5);
        assert_eq!(config.default_color, Color::RED);
        assert!(config.font_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .with_highlight_size(80.0, 16.0)
            .with_underline(60.0, 2.0, 4.0)
            .with_markup_alpha(0.3)
            .with_signature_width(1.5)
            .with_comment_sizes(10.0, 9.0)
            .with_default_color(Color::BLUE)
            .with_font_path("/tmp/font.ttf");

        assert_eq!(config.highlight_width, 80.0);
        assert_eq!(config.underline_offset, 4.0);
        assert_eq!(config.markup_alpha, 0.3);
        assert_eq!(config.signature_width, 1.5);
        assert_eq!(config.comment_text_size, 9.0);
        assert_eq!(config.default_color, Color::BLUE);
        assert_eq!(config.font_path, Some(PathBuf::from("/tmp/font.ttf")));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("PDF_ANNOTATOR_MARKUP_ALPHA", "0.25");
        env::set_var("PDF_ANNOTATOR_SIGNATURE_WIDTH", "3");
        env::set_var("PDF_ANNOTATOR_COMMENT_TEXT_SIZE", "10");
        env::set_var("PDF_ANNOTATOR_DEFAULT_COLOR", "#00FF00");
        env::set_var("PDF_ANNOTATOR_FONT_PATH", "/tmp/test-font.ttf");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.markup_alpha, 0.25);
        assert_eq!(config.signature_width, 3.0);
        assert_eq!(config.comment_text_size, 10.0);
        assert_eq!(config.default_color, Color::GREEN);
        assert_eq!(config.font_path, Some(PathBuf::from("/tmp/test-font.ttf")));
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&ENV_VARS);
        env::set_var("PDF_ANNOTATOR_SIGNATURE_WIDTH", "4.5");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.signature_width, 4.5);
        assert_eq!(config.markup_alpha, 0.5); // default
        assert_eq!(config.default_color, Color::RED); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("PDF_ANNOTATOR_DEFAULT_COLOR", "crimson");
        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "PDF_ANNOTATOR_DEFAULT_COLOR"));

        env::remove_var("PDF_ANNOTATOR_DEFAULT_COLOR");
        env::set_var("PDF_ANNOTATOR_MARKUP_ALPHA", "1.5");
        let err = EngineConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "markup_alpha"));
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r##"
            # Lighter markup
            markup_alpha = 0.3
            default_color = "#FFFF00"
        "##;

        let config = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(config.markup_alpha, 0.3);
        assert_eq!(config.default_color, Color::YELLOW);
        assert_eq!(config.highlight_width, 100.0); // default
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml("highlight_height = 0.0"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml("default_color = \"red\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EngineConfig::default()
            .with_markup_alpha(0.25)
            .with_font_path("/fonts/sans.ttf");
        let toml = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("annotator.toml");

        let config = EngineConfig::default().with_signature_width(3.0);
        config.save_to_file(&config_path).unwrap();

        let loaded = EngineConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
