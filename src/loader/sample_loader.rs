use std::path::{Path, PathBuf};

use tracing::debug;

use crate::audio::sample_buffer::SampleBuffer;
use crate::error::LoadError;

// formats a manifest may name; only wav is decoded here
pub const KNOWN_FORMATS: [&str; 3] = ["mp3", "wav", "ogg"];

/// Turns an asset url into a decoded buffer at the engine rate.
pub trait AssetLoader {
    fn resolve_asset(&self, url: &str) -> Result<SampleBuffer, LoadError>;
}

impl<L: AssetLoader + ?Sized> AssetLoader for &L {
    fn resolve_asset(&self, url: &str) -> Result<SampleBuffer, LoadError> {
        (**self).resolve_asset(url)
    }
}

/// Loads WAVs from disk, urls are relative to `root`.
#[derive(Clone, Debug)]
pub struct WavLoader {
    root: PathBuf,
    sample_rate: u32,
}

impl WavLoader {
    pub fn new(root: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self { root: root.into(), sample_rate }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn extension(url: &str) -> Option<String> {
    Path::new(url).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

impl AssetLoader for WavLoader {
    fn resolve_asset(&self, url: &str) -> Result<SampleBuffer, LoadError> {
        match extension(url).as_deref() {
            Some("wav") => {}
            Some(ext) if KNOWN_FORMATS.contains(&ext) => {
                return Err(LoadError::UnsupportedFormat(format!("{ext} decoding is not available")));
            }
            Some(ext) => return Err(LoadError::UnsupportedFormat(ext.to_string())),
            None => return Err(LoadError::UnsupportedFormat(format!("{url} has no extension"))),
        }
        let path = self.root.join(url);
        debug!(path = %path.display(), "loading wav");
        SampleBuffer::load_wav(&path, self.sample_rate)
    }
}
