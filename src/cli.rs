//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. Analysis
//! parameters are optional here so that values from `.twombli.toml`
//! survive unless overridden.

use clap::Parser;
use std::path::PathBuf;

/// twombli-batch - run TWOMBLI fibre analysis over a directory of images
///
/// Processes every image in the input directory with the item pipeline,
/// then consolidates the per-image CSVs into twombli_summary.csv and
/// gaps_summary.csv in the output directory.
///
/// Examples:
///   twombli-batch --input ./images --output ./results
///   twombli-batch --input ./images --output ./results --dark-lines --no-gap-analysis
///   twombli-batch --input ./images --output ./results --dry-run
///   twombli-batch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Directory containing the images to process
    #[arg(short, long, value_name = "DIR", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Directory receiving artifacts and summaries (must exist and be empty)
    #[arg(short, long, value_name = "DIR", required_unless_present = "init_config")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .twombli.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Image file suffixes to include (comma-separated, case-sensitive)
    ///
    /// Example: --extensions .tif,.png
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Item pipeline executable
    #[arg(long, value_name = "CMD", env = "TWOMBLI_PIPELINE")]
    pub pipeline_command: Option<String>,

    /// Minimum line width in pixels
    #[arg(long, value_name = "PX")]
    pub min_line_width: Option<u32>,

    /// Maximum line width in pixels
    #[arg(long, value_name = "PX")]
    pub max_line_width: Option<u32>,

    /// Detect dark lines on a light background
    #[arg(long, overrides_with = "no_dark_lines")]
    pub dark_lines: bool,

    /// Detect light lines on a dark background (overrides the config file)
    #[arg(long, overrides_with = "dark_lines")]
    pub no_dark_lines: bool,

    /// Minimum branch length in pixels
    #[arg(long, value_name = "PX")]
    pub min_branch_length: Option<u32>,

    /// Properties file for the morphology stage
    #[arg(long, value_name = "FILE")]
    pub properties_file: Option<PathBuf>,

    /// Minimum curvature window
    #[arg(long, value_name = "PX")]
    pub min_curvature_window: Option<u32>,

    /// Curvature window step size
    #[arg(long, value_name = "PX")]
    pub curvature_window_step: Option<u32>,

    /// Maximum curvature window
    #[arg(long, value_name = "PX")]
    pub max_curvature_window: Option<u32>,

    /// Maximum display value for HDM images
    #[arg(long, value_name = "VALUE")]
    pub max_display_hdm: Option<u32>,

    /// Contrast saturation (0.0 - 1.0)
    #[arg(long, value_name = "FRACTION")]
    pub contrast_saturation: Option<f64>,

    /// Run gap analysis (overrides the config file)
    #[arg(long, overrides_with = "no_gap_analysis")]
    pub gap_analysis: bool,

    /// Skip gap analysis (no gaps_summary.csv)
    #[arg(long, overrides_with = "gap_analysis")]
    pub no_gap_analysis: bool,

    /// Minimum gap diameter in pixels
    #[arg(long, value_name = "PX")]
    pub min_gap_diameter: Option<u32>,

    /// Write a JSON run report to this file after a successful run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list the images that would be processed and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .twombli.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Input directory (empty if unset; validated first).
    pub fn input_dir(&self) -> PathBuf {
        self.input.clone().unwrap_or_default()
    }

    /// Output directory (empty if unset; validated first).
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_default()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        let input = match self.input {
            Some(ref p) => p,
            None => return Err("--input is required".to_string()),
        };

        if self.output.is_none() {
            return Err("--output is required".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if !input.is_dir() {
            return Err(format!(
                "Input path is not a directory: {}",
                input.display()
            ));
        }

        Ok(())
    }

    /// `--dark-lines` / `--no-dark-lines`, `None` when neither was given.
    pub fn dark_lines_choice(&self) -> Option<bool> {
        flag_pair(self.dark_lines, self.no_dark_lines)
    }

    /// `--gap-analysis` / `--no-gap-analysis`, `None` when neither was given.
    pub fn gap_analysis_choice(&self) -> Option<bool> {
        flag_pair(self.gap_analysis, self.no_gap_analysis)
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
