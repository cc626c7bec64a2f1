//! Summary aggregation.
//!
//! Merges every item's per-item CSV artifacts into the two directory-wide
//! summary files. All rows are derived and validated before either summary
//! is opened, so a bad artifact aborts without touching the output. Each
//! summary is then written with a single append.

use crate::error::{BatchError, BatchResult};
use crate::models::{BatchRun, ItemResult, SummaryRow};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Consolidated morphology/HDM/alignment summary.
pub const TWOMBLI_SUMMARY: &str = "twombli_summary.csv";

/// Concatenated gap-analysis rows.
pub const GAPS_SUMMARY: &str = "gaps_summary.csv";

/// Fixed trailing header columns.
const ALIGNMENT_COLUMN: &str = "Alignment (Coherency [%])";
const SIZE_COLUMN: &str = "Size";

/// Per-item artifact locations under the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub morphology: PathBuf,
    pub density: PathBuf,
    pub gaps: PathBuf,
}

impl ArtifactPaths {
    pub fn for_item(output: &Path, identifier: &str) -> Self {
        Self {
            morphology: output
                .join("masks")
                .join(format!("{}_results.csv", identifier)),
            density: output
                .join("hdm_csvs")
                .join(format!("{}_ResultsHDM.csv", identifier)),
            gaps: output
                .join("gap_analysis")
                .join(format!("{}_gaps.csv", identifier)),
        }
    }
}

/// What an aggregation pass wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryFiles {
    pub twombli: PathBuf,
    /// Present only when gap analysis ran.
    pub gaps: Option<PathBuf>,
    /// Data rows appended to the twombli summary.
    pub rows: usize,
}

/// Convert an HDM coverage fraction into the void fraction.
pub fn invert_density(raw: f64) -> f64 {
    1.0 - raw
}

/// Render a number for the summary: integral values keep one decimal.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Last comma-separated field, ignoring trailing empty fields.
fn last_field(line: &str) -> &str {
    line.trim_end_matches(',').rsplit(',').next().unwrap_or("")
}

fn read_lines(path: &Path, identifier: &str) -> BatchResult<Vec<String>> {
    if !path.is_file() {
        return Err(BatchError::MissingArtifact {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| BatchError::io(path, e))?;
    Ok(content.lines().map(String::from).collect())
}

fn first_and_last<'a>(lines: &'a [String], path: &Path) -> BatchResult<(&'a str, &'a str)> {
    match (lines.first(), lines.last()) {
        (Some(first), Some(last)) => Ok((first.as_str(), last.as_str())),
        _ => Err(BatchError::MalformedArtifact {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        }),
    }
}

/// Derive the summary row for one item from its artifacts.
pub fn derive_row(
    result: &ItemResult,
    output: &Path,
    perform_gap_analysis: bool,
) -> BatchResult<SummaryRow> {
    let id = &result.identifier;
    let paths = ArtifactPaths::for_item(output, id);

    let morphology = read_lines(&paths.morphology, id)?;
    let density = read_lines(&paths.density, id)?;

    let (morph_header, morph_data) = first_and_last(&morphology, &paths.morphology)?;
    let (density_header, density_data) = first_and_last(&density, &paths.density)?;

    let raw = last_field(density_data);
    let raw_value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| BatchError::MalformedArtifact {
            path: paths.density.clone(),
            reason: format!("'{}' is not a number", raw),
        })?;

    let header = format!(
        "{},{},{},{}",
        morph_header,
        last_field(density_header),
        ALIGNMENT_COLUMN,
        SIZE_COLUMN
    );
    let data = format!(
        "{},{},{},{}",
        morph_data,
        format_value(invert_density(raw_value)),
        format_value(result.alignment),
        format_value(result.dimension)
    );

    let gap_lines = if perform_gap_analysis {
        read_lines(&paths.gaps, id)?
    } else {
        Vec::new()
    };

    Ok(SummaryRow {
        identifier: id.clone(),
        header,
        data,
        gap_lines,
    })
}

fn to_buffer<'a>(lines: impl IntoIterator<Item = &'a str>) -> String {
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    buf
}

fn open_append(path: &Path) -> BatchResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| BatchError::io(path, e))
}

/// Append one row per item, in run order, to the summary files.
///
/// The header comes from the first item and is written once, before the
/// first data row. Both summaries are opened before either is written; if
/// the gaps summary cannot be opened, a twombli summary created by this call
/// is removed again.
pub fn aggregate(
    run: &BatchRun,
    output: &Path,
    perform_gap_analysis: bool,
) -> BatchResult<SummaryFiles> {
    let rows = run
        .items()
        .iter()
        .map(|result| {
            let row = derive_row(result, output, perform_gap_analysis)?;
            debug!("Derived summary row for {}", row.identifier);
            Ok::<_, BatchError>(row)
        })
        .collect::<BatchResult<Vec<_>>>()?;

    let twombli = output.join(TWOMBLI_SUMMARY);
    let gaps = perform_gap_analysis.then(|| output.join(GAPS_SUMMARY));

    let twombli_buf = rows.first().map(|first| {
        let data = rows.iter().map(|r| r.data.as_str());
        to_buffer(std::iter::once(first.header.as_str()).chain(data))
    });
    let gaps_buf = gaps.as_ref().map(|_| {
        to_buffer(
            rows.iter()
                .flat_map(|r| r.gap_lines.iter().map(String::as_str)),
        )
    });

    let twombli_existed = twombli.exists();
    let twombli_file = match twombli_buf {
        Some(_) => Some(open_append(&twombli)?),
        None => None,
    };
    let gaps_file = match gaps {
        Some(ref path) => match open_append(path) {
            Ok(file) => Some(file),
            Err(e) => {
                if twombli_file.is_some() && !twombli_existed {
                    drop(twombli_file);
                    if let Err(remove) = fs::remove_file(&twombli) {
                        warn!("Could not remove {}: {}", twombli.display(), remove);
                    }
                }
                return Err(e);
            }
        },
        None => None,
    };

    if let (Some(mut file), Some(buf)) = (twombli_file, twombli_buf) {
        file.write_all(buf.as_bytes())
            .map_err(|e| BatchError::io(&twombli, e))?;
        info!("Wrote {} rows to {}", rows.len(), twombli.display());
    }

    if let (Some(mut file), Some(buf), Some(path)) = (gaps_file, gaps_buf, gaps.as_ref()) {
        file.write_all(buf.as_bytes())
            .map_err(|e| BatchError::io(path, e))?;
        debug!("Wrote gap rows to {}", path.display());
    }

    Ok(SummaryFiles {
        twombli,
        gaps,
        rows: rows.len(),
    })
}
