//! Data models for the batch runner.
//!
//! This module contains the core data structures shared by discovery,
//! orchestration and aggregation: the immutable run configuration, the
//! per-item results and the ordered batch run they accumulate into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Line width range (pixels) used by the ridge detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineWidthRange {
    pub min: u32,
    pub max: u32,
}

impl fmt::Display for LineWidthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

/// Curvature window sweep: `min`, `min + step`, ... up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvatureWindow {
    pub min: u32,
    pub step: u32,
    pub max: u32,
}

impl fmt::Display for CurvatureWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} step {}", self.min, self.max, self.step)
    }
}

/// The full set of options for one batch run.
///
/// Built once from CLI arguments and the config file, then handed unchanged
/// to every pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfiguration {
    /// Directory holding the input images.
    pub source_directory: PathBuf,
    /// Directory receiving per-item artifacts and the summaries.
    pub output_directory: PathBuf,
    /// File-name suffixes selecting input images (e.g. `.tif`).
    pub extensions: Vec<String>,
    pub line_width: LineWidthRange,
    /// Detect dark fibres on a light background.
    pub dark_lines: bool,
    pub minimum_branch_length: u32,
    /// Optional properties file forwarded to the morphology stage.
    pub external_properties_file: Option<PathBuf>,
    pub curvature_window: CurvatureWindow,
    /// Upper display bound for the HDM image.
    pub max_display_value: u32,
    /// Fraction of saturated pixels during contrast enhancement, in [0, 1].
    pub contrast_saturation: f64,
    pub perform_gap_analysis: bool,
    pub minimum_gap_diameter: u32,
}

/// Result of running the item pipeline on one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// Stable name used for every artifact of this item.
    pub identifier: String,
    /// Coherency score.
    pub alignment: f64,
    /// Fractal dimension.
    pub dimension: f64,
}

/// Ordered results of one batch invocation, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchRun {
    items: Vec<ItemResult>,
}

impl BatchRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the result of the next item.
    pub fn push(&mut self, result: ItemResult) {
        self.items.push(result);
    }

    pub fn items(&self) -> &[ItemResult] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl FromIterator<ItemResult> for BatchRun {
    fn from_iter<I: IntoIterator<Item = ItemResult>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// One line of `twombli_summary.csv`, derived from an item's artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Item this row was derived from.
    pub identifier: String,
    /// Combined header, as derived from this item's artifacts.
    pub header: String,
    /// Data line.
    pub data: String,
    /// Gap-analysis lines to copy verbatim, when gap analysis is enabled.
    pub gap_lines: Vec<String>,
}
