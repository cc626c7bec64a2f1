//! Run report generation.
//!
//! Builds the JSON run report written by `--report` and the console
//! summary printed after a successful batch.

use crate::analysis::SummaryFiles;
use crate::batch::CompletedBatch;
use crate::models::{BatchConfiguration, ItemResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Metadata about one batch invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Number of images processed.
    pub items_processed: usize,
    pub twombli_summary: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps_summary: Option<PathBuf>,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    /// Parameters every item was processed with.
    pub configuration: BatchConfiguration,
    /// Item results in discovery order.
    pub items: Vec<ItemResult>,
}

impl RunReport {
    pub fn new(
        config: &BatchConfiguration,
        batch: &CompletedBatch,
        started_at: DateTime<Utc>,
        duration_seconds: f64,
    ) -> Self {
        let SummaryFiles {
            ref twombli,
            ref gaps,
            rows,
        } = batch.summaries;

        Self {
            metadata: RunMetadata {
                started_at,
                duration_seconds,
                items_processed: rows,
                twombli_summary: twombli.clone(),
                gaps_summary: gaps.clone(),
            },
            configuration: config.clone(),
            items: batch.run.items().to_vec(),
        }
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write a JSON report to a file.
pub fn write_json_report(report: &RunReport, path: &Path) -> Result<()> {
    let content = generate_json_report(report)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

/// Generate the console summary shown after a run.
pub fn generate_summary_text(report: &RunReport) -> String {
    let meta = &report.metadata;
    let mut lines = Vec::new();

    lines.push(format!("Images processed: {}", meta.items_processed));
    lines.push(format!("Summary: {}", meta.twombli_summary.display()));
    if let Some(ref gaps) = meta.gaps_summary {
        lines.push(format!("Gaps: {}", gaps.display()));
    }
    lines.push(format!("Duration: {:.1}s", meta.duration_seconds));

    lines.join("\n")
}
