//! Batch orchestration.
//!
//! Drives the item pipeline over every discovered image in discovery order,
//! then hands the collected results to the aggregator. The first failure of
//! any kind aborts the whole batch.

pub mod progress;

pub use progress::{ProgressEvent, ProgressSink};

use crate::analysis::{self, SummaryFiles};
use crate::error::{BatchError, BatchResult};
use crate::models::{BatchConfiguration, BatchRun};
use crate::pipeline::{DecodingLoader, ImageLoader, ItemPipeline};
use crate::scanner::{self, BatchDiscoverer};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// A batch that ran to completion.
#[derive(Debug, Clone)]
pub struct CompletedBatch {
    /// Item results in discovery order.
    pub run: BatchRun,
    pub summaries: SummaryFiles,
}

/// Runs the item pipeline over a directory and writes the summaries.
pub struct BatchOrchestrator {
    pipeline: Box<dyn ItemPipeline>,
    loader: Box<dyn ImageLoader>,
    progress: Option<Box<dyn ProgressSink>>,
}

impl BatchOrchestrator {
    /// Create an orchestrator that decodes images with the `image` crate.
    pub fn new(pipeline: Box<dyn ItemPipeline>) -> Self {
        Self {
            pipeline,
            loader: Box::new(DecodingLoader),
            progress: None,
        }
    }

    /// Replace the image loader.
    pub fn with_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Attach a progress sink.
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(ref sink) = self.progress {
            sink.on_event(event);
        }
    }

    /// Process every image under the source directory, then aggregate.
    pub fn run(&mut self, config: &BatchConfiguration) -> BatchResult<CompletedBatch> {
        let discoverer = BatchDiscoverer::new(config.extensions.clone());
        let files = discoverer.discover(&config.source_directory);

        if files.is_empty() {
            return Err(BatchError::NoInputFiles {
                directory: config.source_directory.clone(),
            });
        }

        if !scanner::ensure_empty_output_directory(&config.output_directory) {
            return Err(BatchError::DirtyOutput {
                directory: config.output_directory.clone(),
            });
        }

        check_unique_identifiers(&files)?;
        self.pipeline.check_ready()?;

        info!(
            "Processing {} images from {}",
            files.len(),
            config.source_directory.display()
        );
        self.emit(ProgressEvent::Started { total: files.len() });

        let mut run = BatchRun::new();
        for (index, path) in files.into_iter().enumerate() {
            debug!("[{}] Loading {}", index + 1, path.display());
            self.emit(ProgressEvent::ItemStarted {
                index,
                path: path.clone(),
            });

            let image = self.loader.load(&path)?;
            let result = self.pipeline.process(&image, config)?;

            info!(
                "Processed {} (alignment {}, dimension {})",
                result.identifier, result.alignment, result.dimension
            );
            self.emit(ProgressEvent::ItemCompleted {
                result: result.clone(),
            });
            run.push(result);
        }

        self.emit(ProgressEvent::Aggregating);
        let summaries = analysis::aggregate(
            &run,
            &config.output_directory,
            config.perform_gap_analysis,
        )?;

        self.emit(ProgressEvent::Finished {
            processed: run.len(),
        });

        Ok(CompletedBatch { run, summaries })
    }
}

/// Reject batches where two inputs would share artifact names.
fn check_unique_identifiers(files: &[PathBuf]) -> BatchResult<()> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();

    for path in files {
        let identifier = scanner::identifier_for(path);
        if let Some(first) = seen.insert(identifier.clone(), path) {
            return Err(BatchError::DuplicateIdentifier {
                identifier,
                first: first.clone(),
                second: path.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ArtifactPaths, GAPS_SUMMARY, TWOMBLI_SUMMARY};
    use crate::config::Config;
    use crate::models::ItemResult;
    use crate::pipeline::LoadedImage;
    use image::DynamicImage;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Loader that never touches the file contents.
    struct BlankLoader;

    impl ImageLoader for BlankLoader {
        fn load(&self, path: &Path) -> BatchResult<LoadedImage> {
            Ok(LoadedImage::new(
                path.to_path_buf(),
                DynamicImage::new_luma8(1, 1),
            ))
        }
    }

    /// Pipeline writing canned artifacts: identifier -> (density, alignment, dimension).
    struct StubPipeline {
        outputs: HashMap<String, (f64, f64, f64)>,
        fail_on: Option<String>,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl StubPipeline {
        fn new(outputs: &[(&str, f64, f64, f64)]) -> Self {
            Self {
                outputs: outputs
                    .iter()
                    .map(|(id, d, a, s)| (id.to_string(), (*d, *a, *s)))
                    .collect(),
                fail_on: None,
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl ItemPipeline for StubPipeline {
        fn process(
            &mut self,
            image: &LoadedImage,
            config: &BatchConfiguration,
        ) -> BatchResult<ItemResult> {
            let id = image.identifier.clone();
            self.calls.borrow_mut().push(id.clone());

            if self.fail_on.as_deref() == Some(id.as_str()) {
                return Err(BatchError::ItemProcessing {
                    identifier: id,
                    message: "ridge detection failed".to_string(),
                });
            }

            let (density, alignment, dimension) = self.outputs[&id];
            let out = &config.output_directory;
            let paths = ArtifactPaths::for_item(out, &id);
            for dir in ["masks", "hdm_csvs", "gap_analysis"] {
                fs::create_dir_all(out.join(dir)).unwrap();
            }
            fs::write(&paths.morphology, format!("name,w,h\n{id},1.0,2.0\n")).unwrap();
            fs::write(&paths.density, format!("name,val\n{id},{density}\n")).unwrap();
            if config.perform_gap_analysis {
                fs::write(&paths.gaps, format!("{id},gap\n")).unwrap();
            }

            Ok(ItemResult {
                identifier: id,
                alignment,
                dimension,
            })
        }
    }

    struct RecordingSink(Rc<RefCell<Vec<String>>>);

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: ProgressEvent) {
            let label = match event {
                ProgressEvent::Started { total } => format!("started:{total}"),
                ProgressEvent::ItemStarted { index, .. } => format!("item:{index}"),
                ProgressEvent::ItemCompleted { result, .. } => format!("done:{}", result.identifier),
                ProgressEvent::Aggregating => "aggregating".to_string(),
                ProgressEvent::Finished { processed } => format!("finished:{processed}"),
            };
            self.0.borrow_mut().push(label);
        }
    }

    struct Fixture {
        _temp: TempDir,
        config: BatchConfiguration,
    }

    fn fixture(inputs: &[&str], gap_analysis: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("images");
        let output = temp.path().join("results");
        fs::create_dir(&input).unwrap();
        fs::create_dir(&output).unwrap();
        for name in inputs {
            fs::write(input.join(name), "pixels").unwrap();
        }

        let mut config = Config::default();
        config.batch.extensions = vec![".tif".to_string(), ".png".to_string()];
        config.analysis.gap_analysis = gap_analysis;

        Fixture {
            config: config.batch_configuration(input, output),
            _temp: temp,
        }
    }

    fn orchestrator(pipeline: StubPipeline) -> BatchOrchestrator {
        BatchOrchestrator::new(Box::new(pipeline)).with_loader(Box::new(BlankLoader))
    }

    #[test]
    fn test_end_to_end_two_items() {
        let fx = fixture(&["a.tif", "b.tif", "notes.txt"], false);
        let pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5), ("b", 0.1, 0.8, 1.4)]);

        let batch = orchestrator(pipeline).run(&fx.config).unwrap();

        assert_eq!(batch.run.len(), 2);
        assert_eq!(batch.summaries.rows, 2);

        let expected_row = |id: &str| match id {
            "a" => "a,1.0,2.0,0.7,0.9,1.5",
            "b" => "b,1.0,2.0,0.9,0.8,1.4",
            other => panic!("unexpected item {other}"),
        };
        let mut expected = vec!["name,w,h,val,Alignment (Coherency [%]),Size"];
        expected.extend(batch.run.items().iter().map(|r| expected_row(&r.identifier)));

        let summary = fs::read_to_string(fx.config.output_directory.join(TWOMBLI_SUMMARY)).unwrap();
        assert_eq!(summary.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_gap_summary_follows_run_order() {
        let fx = fixture(&["a.tif", "b.tif"], true);
        let pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5), ("b", 0.1, 0.8, 1.4)]);

        let batch = orchestrator(pipeline).run(&fx.config).unwrap();

        let gaps = fs::read_to_string(fx.config.output_directory.join(GAPS_SUMMARY)).unwrap();
        let expected: Vec<String> = batch
            .run
            .items()
            .iter()
            .map(|r| format!("{},gap", r.identifier))
            .collect();
        assert_eq!(gaps.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_run_order_matches_processing_order() {
        let fx = fixture(&["a.tif", "b.tif", "c.png"], false);
        let pipeline = StubPipeline::new(&[
            ("a", 0.3, 0.9, 1.5),
            ("b", 0.1, 0.8, 1.4),
            ("c", 0.5, 0.7, 1.3),
        ]);
        let calls = pipeline.calls.clone();

        let batch = orchestrator(pipeline).run(&fx.config).unwrap();

        let ids: Vec<String> = batch.run.items().iter().map(|r| r.identifier.clone()).collect();
        assert_eq!(*calls.borrow(), ids);
    }

    #[test]
    fn test_no_input_files() {
        let fx = fixture(&["notes.txt", "a.tif.bak"], false);
        let pipeline = StubPipeline::new(&[]);
        let calls = pipeline.calls.clone();

        let err = orchestrator(pipeline).run(&fx.config).unwrap_err();

        assert!(matches!(err, BatchError::NoInputFiles { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_dirty_output_directory() {
        let fx = fixture(&["a.tif"], false);
        fs::write(fx.config.output_directory.join("stale.csv"), "old").unwrap();
        let pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5)]);
        let calls = pipeline.calls.clone();

        let err = orchestrator(pipeline).run(&fx.config).unwrap_err();

        assert!(matches!(err, BatchError::DirtyOutput { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_output_directory() {
        let mut fx = fixture(&["a.tif"], false);
        fx.config.output_directory = fx.config.output_directory.join("absent");

        let err = orchestrator(StubPipeline::new(&[("a", 0.3, 0.9, 1.5)]))
            .run(&fx.config)
            .unwrap_err();
        assert!(matches!(err, BatchError::DirtyOutput { .. }));
    }

    #[test]
    fn test_item_failure_aborts_batch() {
        let fx = fixture(&["a.tif", "b.tif"], false);
        let mut pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5), ("b", 0.1, 0.8, 1.4)]);
        pipeline.fail_on = Some("b".to_string());

        let err = orchestrator(pipeline).run(&fx.config).unwrap_err();

        assert!(matches!(err, BatchError::ItemProcessing { .. }));
        assert!(!fx.config.output_directory.join(TWOMBLI_SUMMARY).exists());
    }

    #[test]
    fn test_duplicate_identifiers_rejected() {
        let fx = fixture(&["a.tif", "a.png"], false);
        let pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5)]);
        let calls = pipeline.calls.clone();

        let err = orchestrator(pipeline).run(&fx.config).unwrap_err();

        assert!(matches!(err, BatchError::DuplicateIdentifier { ref identifier, .. } if identifier == "a"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_pipeline_not_ready() {
        struct Unavailable;

        impl ItemPipeline for Unavailable {
            fn check_ready(&self) -> BatchResult<()> {
                Err(BatchError::PipelineUnavailable("no runtime".to_string()))
            }

            fn process(
                &mut self,
                _image: &LoadedImage,
                _config: &BatchConfiguration,
            ) -> BatchResult<ItemResult> {
                unreachable!("process called on unavailable pipeline")
            }
        }

        let fx = fixture(&["a.tif"], false);
        let err = BatchOrchestrator::new(Box::new(Unavailable))
            .with_loader(Box::new(BlankLoader))
            .run(&fx.config)
            .unwrap_err();

        assert!(matches!(err, BatchError::PipelineUnavailable(_)));
    }

    #[test]
    fn test_undecodable_image_aborts() {
        let fx = fixture(&["a.png"], false);
        let pipeline = StubPipeline::new(&[("a", 0.3, 0.9, 1.5)]);
        let calls = pipeline.calls.clone();

        let err = BatchOrchestrator::new(Box::new(pipeline))
            .run(&fx.config)
            .unwrap_err();

        assert!(matches!(err, BatchError::ImageLoad { .. }));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_progress_events() {
        let fx = fixture(&["a.tif"], false);
        let events = Rc::new(RefCell::new(Vec::new()));

        orchestrator(StubPipeline::new(&[("a", 0.3, 0.9, 1.5)]))
            .with_progress(Box::new(RecordingSink(events.clone())))
            .run(&fx.config)
            .unwrap();

        assert_eq!(
            *events.borrow(),
            vec!["started:1", "item:0", "done:a", "aggregating", "finished:1"]
        );
    }
}
