//! # zonestat Batch
//!
//! Batch zonal statistics over a folder of vector files against two raster
//! layers (by default an organic-horizon-thickness layer and a slope layer).
//!
//! For each discovered vector file the pipeline parses it, resolves a
//! common CRS, samples both layers per feature, combines the two statistic
//! sets and writes an enriched GeoJSON. Every file runs in isolation; a
//! machine-readable `processing_summary.json` records what happened.
//!
//! ```ignore
//! use zonestat_batch::{BatchConfig, BatchOrchestrator, NoProgress};
//!
//! let config = BatchConfig::new("ohm.tif", "slope.tif", "parcels/", "results/");
//! let summary = BatchOrchestrator::new(config)?.run(&mut NoProgress)?;
//! println!("{:.1}% succeeded", summary.success_rate());
//! ```

pub mod aggregate;
pub mod combine;
pub mod config;
pub mod error;
pub mod layer;
pub mod locator;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod summary;
pub mod validation;
pub mod writer;

pub use aggregate::{ZonalAggregator, ZonalResult};
pub use combine::{combine, CombinedRecord, LayerStatistics, STAT_KEYS};
pub use config::{BatchConfig, LayerConfig, RasterPrecedence, DEFAULT_NODATA, DEFAULT_OUTPUT_SUFFIX};
pub use error::{BatchError, FailureKind, Result};
pub use layer::RasterLayer;
pub use locator::VectorFileLocator;
pub use logging::{LogConfig, LogSink};
pub use orchestrator::{BatchOrchestrator, CancelFlag, RunState};
pub use progress::{ChannelProgress, NoProgress, ProgressEvent, ProgressSink};
pub use resolver::{CrsResolver, ResolvedGeometries};
pub use summary::{FileOutcome, FileRecord, RunOutcome, RunSummary, SUMMARY_FILE_NAME};
pub use writer::{write_result, OutputNames};

pub use zonestat_algorithms::CoverageRule;
