//! Configuration file handling.
//!
//! This module handles loading `.twombli.toml` files and merging them with
//! command-line overrides into a [`BatchConfiguration`].

use crate::models::{BatchConfiguration, CurvatureWindow, LineWidthRange};
use crate::scanner::DEFAULT_EXTENSIONS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".twombli.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Input selection settings.
    #[serde(default)]
    pub batch: BatchSettings,

    /// Analysis parameters forwarded to the item pipeline.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Item pipeline command.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Input selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// File-name suffixes treated as images.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

/// Analysis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_min_line_width")]
    pub minimum_line_width: u32,

    #[serde(default = "default_max_line_width")]
    pub maximum_line_width: u32,

    #[serde(default)]
    pub dark_lines: bool,

    #[serde(default = "default_min_branch_length")]
    pub minimum_branch_length: u32,

    /// Properties file for the morphology stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_file: Option<PathBuf>,

    #[serde(default = "default_curvature_window")]
    pub minimum_curvature_window: u32,

    #[serde(default = "default_curvature_step")]
    pub curvature_window_step: u32,

    #[serde(default = "default_curvature_window")]
    pub maximum_curvature_window: u32,

    #[serde(default = "default_max_display_hdm")]
    pub maximum_display_hdm: u32,

    #[serde(default = "default_contrast_saturation")]
    pub contrast_saturation: f64,

    #[serde(default = "default_true")]
    pub gap_analysis: bool,

    #[serde(default)]
    pub minimum_gap_diameter: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            minimum_line_width: default_min_line_width(),
            maximum_line_width: default_max_line_width(),
            dark_lines: false,
            minimum_branch_length: default_min_branch_length(),
            properties_file: None,
            minimum_curvature_window: default_curvature_window(),
            curvature_window_step: default_curvature_step(),
            maximum_curvature_window: default_curvature_window(),
            maximum_display_hdm: default_max_display_hdm(),
            contrast_saturation: default_contrast_saturation(),
            gap_analysis: true,
            minimum_gap_diameter: 0,
        }
    }
}

fn default_min_line_width() -> u32 {
    5
}

fn default_max_line_width() -> u32 {
    20
}

fn default_min_branch_length() -> u32 {
    10
}

fn default_curvature_window() -> u32 {
    40
}

fn default_curvature_step() -> u32 {
    10
}

fn default_max_display_hdm() -> u32 {
    200
}

fn default_contrast_saturation() -> f64 {
    0.35
}

fn default_true() -> bool {
    true
}

/// External pipeline command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Executable run once per image.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments placed before the per-item flags.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
        }
    }
}

fn default_command() -> String {
    "twombli-item".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if it exists.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Try to load configuration from the default location.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_present(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref extensions) = args.extensions {
            self.batch.extensions = extensions.clone();
        }

        let analysis = &mut self.analysis;
        if let Some(v) = args.min_line_width {
            analysis.minimum_line_width = v;
        }
        if let Some(v) = args.max_line_width {
            analysis.maximum_line_width = v;
        }
        if let Some(v) = args.dark_lines_choice() {
            analysis.dark_lines = v;
        }
        if let Some(v) = args.min_branch_length {
            analysis.minimum_branch_length = v;
        }
        if let Some(ref path) = args.properties_file {
            analysis.properties_file = Some(path.clone());
        }
        if let Some(v) = args.min_curvature_window {
            analysis.minimum_curvature_window = v;
        }
        if let Some(v) = args.curvature_window_step {
            analysis.curvature_window_step = v;
        }
        if let Some(v) = args.max_curvature_window {
            analysis.maximum_curvature_window = v;
        }
        if let Some(v) = args.max_display_hdm {
            analysis.maximum_display_hdm = v;
        }
        if let Some(v) = args.contrast_saturation {
            analysis.contrast_saturation = v;
        }
        if let Some(v) = args.gap_analysis_choice() {
            analysis.gap_analysis = v;
        }
        if let Some(v) = args.min_gap_diameter {
            analysis.minimum_gap_diameter = v;
        }

        if let Some(ref command) = args.pipeline_command {
            self.pipeline.command = command.clone();
        }
    }

    /// Freeze the settings into the configuration handed to every item.
    pub fn batch_configuration(&self, source: PathBuf, output: PathBuf) -> BatchConfiguration {
        let a = &self.analysis;
        BatchConfiguration {
            source_directory: source,
            output_directory: output,
            extensions: self.batch.extensions.clone(),
            line_width: LineWidthRange {
                min: a.minimum_line_width,
                max: a.maximum_line_width,
            },
            dark_lines: a.dark_lines,
            minimum_branch_length: a.minimum_branch_length,
            external_properties_file: a.properties_file.clone(),
            curvature_window: CurvatureWindow {
                min: a.minimum_curvature_window,
                step: a.curvature_window_step,
                max: a.maximum_curvature_window,
            },
            max_display_value: a.maximum_display_hdm,
            contrast_saturation: a.contrast_saturation,
            perform_gap_analysis: a.gap_analysis,
            minimum_gap_diameter: a.minimum_gap_diameter,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
