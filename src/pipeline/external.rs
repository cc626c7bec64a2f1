//! Item pipeline backed by an external executable.
//!
//! The executable is run once per image with the item and every
//! configuration parameter passed as flags. It writes the per-item CSV
//! artifacts itself and reports its scores as a JSON object on the last
//! non-empty line of stdout:
//!
//! ```text
//! {"alignment": 0.91, "dimension": 1.52}
//! ```

use super::{ItemPipeline, LoadedImage};
use crate::error::{BatchError, BatchResult};
use crate::models::{BatchConfiguration, ItemResult};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Scores printed by the external command.
#[derive(Debug, Clone, Deserialize)]
struct PipelineOutput {
    alignment: f64,
    dimension: f64,
}

/// Runs a configured command for each item.
#[derive(Debug, Clone)]
pub struct ExternalCommandPipeline {
    command: String,
    args: Vec<String>,
}

impl ExternalCommandPipeline {
    /// `args` are placed before the per-item flags.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Locate the executable, either as given or on `PATH`.
    fn resolve(&self) -> Option<PathBuf> {
        let candidate = Path::new(&self.command);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }

        let paths = env::var_os("PATH")?;
        env::split_paths(&paths)
            .map(|dir| dir.join(&self.command))
            .find(|p| p.is_file())
    }
}

/// Build the per-item flags handed to the external command.
pub fn item_arguments(image: &LoadedImage, config: &BatchConfiguration) -> Vec<String> {
    let mut args = vec![
        "--input".to_string(),
        image.path.display().to_string(),
        "--output".to_string(),
        config.output_directory.display().to_string(),
        "--identifier".to_string(),
        image.identifier.clone(),
        "--min-line-width".to_string(),
        config.line_width.min.to_string(),
        "--max-line-width".to_string(),
        config.line_width.max.to_string(),
        "--min-branch-length".to_string(),
        config.minimum_branch_length.to_string(),
        "--min-curvature-window".to_string(),
        config.curvature_window.min.to_string(),
        "--curvature-window-step".to_string(),
        config.curvature_window.step.to_string(),
        "--max-curvature-window".to_string(),
        config.curvature_window.max.to_string(),
        "--max-display-hdm".to_string(),
        config.max_display_value.to_string(),
        "--contrast-saturation".to_string(),
        config.contrast_saturation.to_string(),
        "--min-gap-diameter".to_string(),
        config.minimum_gap_diameter.to_string(),
    ];

    if config.dark_lines {
        args.push("--dark-lines".to_string());
    }
    if config.perform_gap_analysis {
        args.push("--gap-analysis".to_string());
    }
    if let Some(ref properties) = config.external_properties_file {
        args.push("--properties".to_string());
        args.push(properties.display().to_string());
    }

    args
}

/// Parse the scores from the command's stdout.
fn parse_output(stdout: &str) -> Result<PipelineOutput, String> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| "command printed no result".to_string())?;

    serde_json::from_str(line).map_err(|e| format!("invalid result line '{}': {}", line, e))
}

impl ItemPipeline for ExternalCommandPipeline {
    fn check_ready(&self) -> BatchResult<()> {
        match self.resolve() {
            Some(path) => {
                debug!("Pipeline command resolved to {}", path.display());
                Ok(())
            }
            None => Err(BatchError::PipelineUnavailable(format!(
                "command not found: {}",
                self.command
            ))),
        }
    }

    fn process(
        &mut self,
        image: &LoadedImage,
        config: &BatchConfiguration,
    ) -> BatchResult<ItemResult> {
        let failure = |message: String| BatchError::ItemProcessing {
            identifier: image.identifier.clone(),
            message,
        };

        info!(
            "Running pipeline on {} ({}x{})",
            image.identifier,
            image.width(),
            image.height()
        );

        let output = Command::new(&self.command)
            .args(&self.args)
            .args(item_arguments(image, config))
            .output()
            .map_err(|e| failure(format!("failed to start {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let scores = parse_output(&stdout).map_err(failure)?;

        Ok(ItemResult {
            identifier: image.identifier.clone(),
            alignment: scores.alignment,
            dimension: scores.dimension,
        })
    }
}
