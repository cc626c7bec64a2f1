//! twombli-batch - batch runner for TWOMBLI fibre analysis
//!
//! Runs the per-image analysis pipeline over a directory of microscopy
//! images and consolidates the per-image CSVs into directory-wide
//! summaries.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any failure (no inputs, dirty output, pipeline or aggregation error)

mod analysis;
mod batch;
mod cli;
mod config;
mod error;
mod models;
mod pipeline;
mod report;
mod scanner;

use anyhow::{Context, Result};
use batch::{BatchOrchestrator, ProgressEvent, ProgressSink};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::BatchConfiguration;
use pipeline::ExternalCommandPipeline;
use report::RunReport;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("twombli-batch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_batch(args) {
        error!("Batch failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .twombli.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to set the pipeline command and analysis parameters.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Renders orchestrator progress as a terminal progress bar.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => self.bar.set_length(total as u64),
            ProgressEvent::ItemStarted { index, path } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.bar.set_message(format!("#{} {}", index + 1, name));
            }
            ProgressEvent::ItemCompleted { result } => {
                self.bar.set_message(format!("{} done", result.identifier));
                self.bar.inc(1);
            }
            ProgressEvent::Aggregating => self.bar.set_message("writing summaries"),
            ProgressEvent::Finished { processed } => {
                self.bar.finish_with_message(format!("{} images", processed))
            }
        }
    }
}

/// Run the complete batch workflow.
fn run_batch(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let batch_config = config.batch_configuration(args.input_dir(), args.output_dir());

    if args.dry_run {
        handle_dry_run(&batch_config);
        return Ok(());
    }

    println!("🔬 Processing images in {}", batch_config.source_directory.display());
    println!("   Pipeline: {}", config.pipeline.command);
    println!("   Line width: {}", batch_config.line_width);
    println!("   Curvature window: {}", batch_config.curvature_window);
    println!(
        "   Gap analysis: {}",
        if batch_config.perform_gap_analysis { "on" } else { "off" }
    );

    let pipeline =
        ExternalCommandPipeline::new(config.pipeline.command.clone(), config.pipeline.args.clone());
    let mut orchestrator = BatchOrchestrator::new(Box::new(pipeline));
    if !args.quiet {
        orchestrator = orchestrator.with_progress(Box::new(BarProgress::new()));
    }

    let started_at = Utc::now();
    let start = Instant::now();

    let batch = orchestrator
        .run(&batch_config)
        .context("Batch run aborted")?;

    let run_report = RunReport::new(
        &batch_config,
        &batch,
        started_at,
        start.elapsed().as_secs_f64(),
    );

    println!("\n📊 Batch Summary:");
    for line in report::generate_summary_text(&run_report).lines() {
        println!("   {}", line);
    }

    if let Some(ref path) = args.report {
        report::write_json_report(&run_report, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("   Report: {}", path.display());
    }

    println!("\n✅ Batch complete!");
    Ok(())
}

/// Handle --dry-run: list what would be processed, exit.
fn handle_dry_run(config: &BatchConfiguration) {
    println!("\n🔍 Dry run: scanning {}...\n", config.source_directory.display());

    let discoverer = scanner::BatchDiscoverer::new(config.extensions.clone());
    let files = discoverer.discover(&config.source_directory);

    if files.is_empty() {
        println!("   No matching images found.");
    } else {
        println!("   Found {} images that would be processed:\n", files.len());
        for file in &files {
            println!(
                "     🖼  {} -> {}",
                file.display(),
                scanner::identifier_for(file)
            );
        }
    }

    if scanner::ensure_empty_output_directory(&config.output_directory) {
        println!("\n   Output directory is ready: {}", config.output_directory.display());
    } else {
        println!(
            "\n   ⚠️  Output directory must exist and be empty: {}",
            config.output_directory.display()
        );
    }

    println!("\n✅ Dry run complete. Nothing was processed.");
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    let loaded = Config::load_default()
        .with_context(|| format!("Invalid {}; fix or remove it", DEFAULT_CONFIG_FILE))?;

    match loaded {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
