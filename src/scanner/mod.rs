//! Input discovery for batch runs.
//!
//! Selects the images directly under the source directory by file-name
//! suffix and checks that the output directory is safe to write into.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Suffixes recognized as images when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".tif", ".tiff", ".png", ".jpg", ".jpeg"];

/// Discovers batch inputs in a flat source directory.
#[derive(Debug, Clone)]
pub struct BatchDiscoverer {
    extensions: Vec<String>,
}

impl BatchDiscoverer {
    /// Create a discoverer matching the given file-name suffixes.
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    /// List matching files directly under `source`, in directory-listing order.
    ///
    /// No recursion and no sorting. A missing or non-directory `source`
    /// yields an empty list.
    pub fn discover(&self, source: &Path) -> Vec<PathBuf> {
        if !source.is_dir() {
            debug!("Source is not a directory: {}", source.display());
            return Vec::new();
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(source).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", source.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if self.matches(&name) {
                files.push(path.to_path_buf());
            }
        }

        debug!("Discovered {} files in {}", files.len(), source.display());
        files
    }

    /// Check a file name against the configured suffixes (case-sensitive).
    pub fn matches(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

/// True only if `output` exists, is a directory, and has no entries.
///
/// Never creates or clears anything.
pub fn ensure_empty_output_directory(output: &Path) -> bool {
    match fs::read_dir(output) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) => {
            debug!("Cannot read output directory {}: {}", output.display(), e);
            false
        }
    }
}

/// Derive an item identifier from its source file name (final extension removed).
pub fn identifier_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
