//! Per-item pipeline seam.
//!
//! The image analysis itself is opaque to the batch runner. An
//! [`ItemPipeline`] receives one loaded image plus the run configuration,
//! writes that item's artifacts under the output directory, and returns an
//! [`ItemResult`].

pub mod external;

pub use external::ExternalCommandPipeline;

use crate::error::{BatchError, BatchResult};
use crate::models::{BatchConfiguration, ItemResult};
use crate::scanner::identifier_for;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// An input image, decoded and named.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Source file.
    pub path: PathBuf,
    /// Name used for every artifact of this item.
    pub identifier: String,
    /// Decoded pixels.
    pub pixels: DynamicImage,
}

impl LoadedImage {
    pub fn new(path: PathBuf, pixels: DynamicImage) -> Self {
        let identifier = identifier_for(&path);
        Self {
            path,
            identifier,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Loads a discovered file into memory.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> BatchResult<LoadedImage>;
}

/// Decodes images with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodingLoader;

impl ImageLoader for DecodingLoader {
    fn load(&self, path: &Path) -> BatchResult<LoadedImage> {
        let pixels = image::open(path).map_err(|source| BatchError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LoadedImage::new(path.to_path_buf(), pixels))
    }
}

/// Analyses one image and writes its artifacts.
///
/// In-process implementations work on [`LoadedImage::pixels`]; out-of-process
/// ones hand [`LoadedImage::path`] to their tool.
///
/// Implementations must write `masks/<id>_results.csv`,
/// `hdm_csvs/<id>_ResultsHDM.csv` and, with gap analysis enabled,
/// `gap_analysis/<id>_gaps.csv` under the configured output directory.
pub trait ItemPipeline {
    /// Verify runtime dependencies before any item is processed.
    fn check_ready(&self) -> BatchResult<()> {
        Ok(())
    }

    fn process(
        &mut self,
        image: &LoadedImage,
        config: &BatchConfiguration,
    ) -> BatchResult<ItemResult>;
}
