//! Where the comment font comes from.

use crate::config::EngineConfig;
use pdf_engine::{FontAsset, StandardFont};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FontFetchError {
    #[error("cannot read font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("font file {0} is empty")]
    Empty(PathBuf),
    #[error("{0}")]
    Unavailable(String),
}

/// Supplies the font asset used for exported comment text.
pub trait FontSource {
    fn fetch(&mut self) -> Result<FontAsset, FontFetchError>;
}

impl<F> FontSource for F
where
    F: FnMut() -> Result<FontAsset, FontFetchError>,
{
    fn fetch(&mut self) -> Result<FontAsset, FontFetchError> {
        self()
    }
}

/// One of the base-14 fonts. Covers Latin-1 only; other characters export
/// as `?`.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontSource(pub StandardFont);

impl Default for StandardFontSource {
    fn default() -> Self {
        Self(StandardFont::Helvetica)
    }
}

impl FontSource for StandardFontSource {
    fn fetch(&mut self) -> Result<FontAsset, FontFetchError> {
        Ok(FontAsset::Standard(self.0))
    }
}

/// TrueType/OpenType file read from disk.
#[derive(Debug, Clone)]
pub struct FileFontSource {
    path: PathBuf,
}

impl FileFontSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl FontSource for FileFontSource {
    fn fetch(&mut self) -> Result<FontAsset, FontFetchError> {
        let bytes = fs::read(&self.path)
            .map_err(|source| FontFetchError::Io { path: self.path.clone(), source })?;
        if bytes.is_empty() {
            return Err(FontFetchError::Empty(self.path.clone()));
        }
        log::info!("loaded comment font {} ({} bytes)", self.path.display(), bytes.len());
        Ok(FontAsset::TrueType(bytes))
    }
}

/// Fetches from its source at most once successfully, then serves the cached
/// asset. Failures are not cached so a later export can retry.
pub struct FontCache {
    source: Box<dyn FontSource>,
    asset: Option<FontAsset>,
}

impl FontCache {
    pub fn new(source: impl FontSource + 'static) -> Self {
        Self { source: Box::new(source), asset: None }
    }

    /// File font when `font_path` is set, Helvetica otherwise.
    pub fn from_config(config: &EngineConfig) -> Self {
        match &config.font_path {
            Some(path) => Self::new(FileFontSource::new(path)),
            None => Self::new(StandardFontSource::default()),
        }
    }

    pub fn get(&mut self) -> Result<&FontAsset, FontFetchError> {
        if self.asset.is_none() {
            self.asset = Some(self.source.fetch()?);
        }
        self.asset.as_ref().ok_or_else(|| FontFetchError::Unavailable("font cache empty".into()))
    }

    pub fn is_loaded(&self) -> bool {
        self.asset.is_some()
    }
}

impl std::fmt::Debug for FontCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCache").field("loaded", &self.is_loaded()).finish()
    }
}
