//! Batch orchestration
//!
//! Runs {parse, resolve CRS, aggregate both layers, combine, write} for
//! every discovered vector file. Each file runs inside an isolation
//! boundary: whatever goes wrong, including a panic, becomes that file's
//! recorded outcome and the run moves on.

use crate::aggregate::ZonalAggregator;
use crate::combine::combine;
use crate::config::BatchConfig;
use crate::error::{BatchError, FailureKind, Result};
use crate::layer::RasterLayer;
use crate::locator::VectorFileLocator;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::resolver::CrsResolver;
use crate::summary::{FileOutcome, FileRecord, RunSummary};
use crate::validation::validate;
use crate::writer::{write_result, OutputNames};
use chrono::Utc;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Dispatch};
use zonestat_algorithms::{PixelSampler, ZonalAggregation};
use zonestat_core::io::{can_read_extension, extension_of, GDAL_EXTENSIONS};

/// Cooperative cancellation, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run state, logged at debug level on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Discovering,
    Processing { index: usize },
    Summarizing,
    Done,
}

/// Drives a batch run over opened raster layers
pub struct BatchOrchestrator {
    config: BatchConfig,
    layer_a: RasterLayer,
    layer_b: RasterLayer,
    resolver: CrsResolver,
    capability: Box<dyn ZonalAggregation>,
    dispatch: Option<Dispatch>,
    cancel: CancelFlag,
}

impl std::fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("config", &self.config)
            .field("layer_a", &self.layer_a.path())
            .field("layer_b", &self.layer_b.path())
            .field("coverage", &self.capability.coverage())
            .finish()
    }
}

impl BatchOrchestrator {
    /// Validate the configuration and open both rasters.
    ///
    /// Errors here are run-fatal: `Validation` or `RasterOpen`.
    pub fn new(config: BatchConfig) -> Result<Self> {
        validate(&config)?;

        let layer_a = RasterLayer::open(&config.layer_a, config.nodata_fallback)?;
        let layer_b = RasterLayer::open(&config.layer_b, config.nodata_fallback)?;

        Ok(Self::from_layers(config, layer_a, layer_b))
    }

    /// Build from layers that are already open. No validation is done.
    pub fn from_layers(config: BatchConfig, layer_a: RasterLayer, layer_b: RasterLayer) -> Self {
        let resolver = CrsResolver::new(config.epsg, config.precedence);
        let capability = Box::new(PixelSampler::new(config.coverage));
        Self {
            config,
            layer_a,
            layer_b,
            resolver,
            capability,
            dispatch: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Use another zonal aggregation capability
    pub fn with_capability(mut self, capability: Box<dyn ZonalAggregation>) -> Self {
        self.capability = capability;
        self
    }

    /// Log every run through `dispatch` instead of the ambient subscriber
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Handle that cancels the remaining files of a run
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn layers(&self) -> (&RasterLayer, &RasterLayer) {
        (&self.layer_a, &self.layer_b)
    }

    /// Process every discovered file and persist the run summary.
    ///
    /// Only a failure to persist the summary is returned as an error;
    /// per-file failures are recorded in the summary.
    pub fn run(&self, progress: &mut dyn ProgressSink) -> Result<RunSummary> {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || self.run_inner(progress)),
            None => self.run_inner(progress),
        }
    }

    fn transition(&self, state: RunState) {
        debug!(?state, "run state");
    }

    fn run_inner(&self, progress: &mut dyn ProgressSink) -> Result<RunSummary> {
        self.transition(RunState::Init);
        let mut summary = RunSummary::new(Utc::now());

        self.transition(RunState::Discovering);
        let mut locator = VectorFileLocator::new(&self.config.input_folder)
            .min_file_size(self.config.min_file_size)
            .exclude(&self.config.output_folder);
        if same_folder(&self.config.input_folder, &self.config.output_folder) {
            debug!("results go into the input folder; skipping earlier results");
            locator = locator.skip_outputs(self.config.output_suffix.as_str());
        }
        let files = locator.locate();
        let total = files.len();
        info!("Found {} vector files in {}", total, self.config.input_folder.display());
        warn_unreadable(&files);
        progress.on_event(ProgressEvent::Discovered { total });

        let mut names = OutputNames::new(&self.config.output_folder, &self.config.output_suffix);

        for (index, path) in files.iter().enumerate() {
            self.transition(RunState::Processing { index });
            progress.on_event(ProgressEvent::FileStarted {
                index,
                total,
                path: path.clone(),
            });

            let outcome = if self.cancel.is_cancelled() {
                FileOutcome::Skipped {
                    reason: "cancelled".into(),
                }
            } else {
                let _span = info_span!("file", index = index + 1, total).entered();
                info!("Processing {}", path.display());
                self.isolate(path, &mut names)
            };

            match &outcome {
                FileOutcome::Succeeded { output, feature_count } => info!(
                    "Wrote {} features to {}",
                    feature_count,
                    output.display()
                ),
                FileOutcome::Failed { kind, reason } => {
                    error!("Failed {} ({:?}): {}", path.display(), kind, reason)
                }
                FileOutcome::Skipped { reason } => {
                    warn!("Skipped {}: {}", path.display(), reason)
                }
            }

            let record = FileRecord {
                input: path.clone(),
                outcome,
            };
            summary.files.push(record.clone());
            progress.on_event(ProgressEvent::FileFinished { index, total, record });
        }

        self.transition(RunState::Summarizing);
        summary.finish(Utc::now());
        let summary_path = summary.write(&self.config.output_folder)?;
        info!(
            "{} of {} files succeeded ({:.1}%), {} failed, {} skipped; summary in {}",
            summary.successful_files(),
            summary.total_files(),
            summary.success_rate(),
            summary.failed_files(),
            summary.skipped_files(),
            summary_path.display()
        );

        self.transition(RunState::Done);
        progress.on_event(ProgressEvent::Finished {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Run one file's pipeline, converting every error and panic to an outcome
    fn isolate(&self, path: &Path, names: &mut OutputNames) -> FileOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process_file(path, names))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => FileOutcome::failed(&e),
            Err(payload) => FileOutcome::Failed {
                kind: FailureKind::Internal,
                reason: format!("panic: {}", panic_message(payload.as_ref())),
            },
        }
    }

    fn process_file(&self, path: &Path, names: &mut OutputNames) -> Result<FileOutcome> {
        let dataset = zonestat_core::io::read_vector(path).map_err(|e| BatchError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if dataset.is_empty() {
            return Ok(FileOutcome::Skipped {
                reason: "empty".into(),
            });
        }

        let resolved = self
            .resolver
            .resolve(&dataset, self.layer_a.crs(), self.layer_b.crs())?;

        let capability = self.capability.as_ref();
        let result_a =
            ZonalAggregator::new(&self.layer_a, capability).aggregate(&resolved.geometries, &resolved.crs)?;
        let result_b =
            ZonalAggregator::new(&self.layer_b, capability).aggregate(&resolved.geometries, &resolved.crs)?;

        let records = combine(result_a, result_b, dataset.len())?;

        let output: PathBuf = names.allocate(path);
        let feature_count = write_result(dataset, resolved, &records, &output)?;

        Ok(FileOutcome::Succeeded {
            output,
            feature_count,
        })
    }
}

/// One warning for the discovered files this build has no reader for
fn warn_unreadable(files: &[PathBuf]) {
    let unreadable = files
        .iter()
        .filter(|path| !extension_of(path).map_or(false, |ext| can_read_extension(&ext)))
        .count();
    if unreadable > 0 {
        warn!(
            "{} of {} files are {} and need the `gdal` feature; they will fail",
            unreadable,
            files.len(),
            GDAL_EXTENSIONS.join("/")
        );
    }
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerConfig;
    use crate::progress::NoProgress;
    use geo::Geometry;
    use tempfile::TempDir;
    use zonestat_algorithms::{CoverageRule, ZonalStats};
    use zonestat_core::{GeoTransform, Raster, CRS};

    struct Panicking;

    impl ZonalAggregation for Panicking {
        fn aggregate(
            &self,
            _raster: &Raster<f64>,
            _nodata: Option<f64>,
            _geometry: &Geometry<f64>,
        ) -> zonestat_core::Result<ZonalStats> {
            panic!("sampler exploded")
        }

        fn coverage(&self) -> CoverageRule {
            CoverageRule::CenterPoint
        }
    }

    fn orchestrator(dir: &TempDir) -> BatchOrchestrator {
        let input = dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(
            input.join("one.geojson"),
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [0.5, 0.5]}}]}"#,
        )
        .unwrap();

        let mut raster: Raster<f64> = Raster::filled(2, 2, 1.0);
        raster.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        raster.set_crs(Some(CRS::wgs84()));

        let config = BatchConfig::new("ohm.tif", "slope.tif", input, dir.path().join("out"));
        std::fs::create_dir_all(&config.output_folder).unwrap();
        let a = RasterLayer::from_raster(&LayerConfig::new("ohm.tif", "ohm"), raster.clone(), None);
        let b = RasterLayer::from_raster(&LayerConfig::new("slope.tif", "slope"), raster, None);
        BatchOrchestrator::from_layers(config, a, b)
    }

    #[test]
    fn panics_are_isolated_per_file() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir).with_capability(Box::new(Panicking));

        let summary = orchestrator.run(&mut NoProgress).unwrap();
        assert_eq!(summary.total_files(), 1);
        match &summary.files[0].outcome {
            FileOutcome::Failed { kind, reason } => {
                assert_eq!(*kind, FailureKind::Internal);
                assert!(reason.contains("sampler exploded"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn cancelled_runs_skip_remaining_files() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir);
        orchestrator.cancel_flag().cancel();

        let summary = orchestrator.run(&mut NoProgress).unwrap();
        assert_eq!(summary.total_files(), 1);
        assert_eq!(
            summary.files[0].outcome,
            FileOutcome::Skipped {
                reason: "cancelled".into()
            }
        );
    }

    #[test]
    fn run_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir);

        let first = orchestrator.run(&mut NoProgress).unwrap();
        let second = orchestrator.run(&mut NoProgress).unwrap();
        assert_eq!(first.files, second.files);
        assert!(first.files[0].outcome.is_success());
    }
}
