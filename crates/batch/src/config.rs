//! Batch run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use zonestat_algorithms::CoverageRule;

/// Nodata value assumed for rasters that do not declare one
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Suffix appended to input stems to name output files
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_zonal_stats";

/// Which raster's CRS wins when the two rasters disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterPrecedence {
    #[default]
    LayerA,
    LayerB,
}

/// One raster input and the prefix of its statistic attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub path: PathBuf,
    pub prefix: String,
}

impl LayerConfig {
    pub fn new(path: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            prefix: prefix.into(),
        }
    }
}

fn default_nodata() -> Option<f64> {
    Some(DEFAULT_NODATA)
}

fn default_min_file_size() -> u64 {
    1
}

fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

/// Configuration for one batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Raster A (OHM, prefix `ohm`)
    pub layer_a: LayerConfig,
    /// Raster B (slope, prefix `slope`)
    pub layer_b: LayerConfig,
    /// Root directory searched recursively for vector files
    pub input_folder: PathBuf,
    /// Directory receiving outputs and `processing_summary.json`
    pub output_folder: PathBuf,
    /// Explicit target CRS
    #[serde(default)]
    pub epsg: Option<u32>,
    #[serde(default)]
    pub coverage: CoverageRule,
    #[serde(default)]
    pub precedence: RasterPrecedence,
    /// Nodata used for rasters that do not declare one
    #[serde(default = "default_nodata")]
    pub nodata_fallback: Option<f64>,
    /// Files smaller than this many bytes are not processed
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
    /// Debug logging; no effect on results
    #[serde(default)]
    pub verbose: bool,
}

impl BatchConfig {
    /// Configuration with the OHM/slope layer prefixes and default options
    pub fn new(
        ohm_raster: impl Into<PathBuf>,
        slope_raster: impl Into<PathBuf>,
        input_folder: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            layer_a: LayerConfig::new(ohm_raster, "ohm"),
            layer_b: LayerConfig::new(slope_raster, "slope"),
            input_folder: input_folder.into(),
            output_folder: output_folder.into(),
            epsg: None,
            coverage: CoverageRule::default(),
            precedence: RasterPrecedence::default(),
            nodata_fallback: default_nodata(),
            min_file_size: default_min_file_size(),
            output_suffix: default_output_suffix(),
            verbose: false,
        }
    }

    pub fn with_epsg(mut self, epsg: Option<u32>) -> Self {
        self.epsg = epsg;
        self
    }

    pub fn with_coverage(mut self, coverage: CoverageRule) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_precedence(mut self, precedence: RasterPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn with_nodata_fallback(mut self, nodata: Option<f64>) -> Self {
        self.nodata_fallback = nodata;
        self
    }

    /// Path of the run summary artifact
    pub fn summary_path(&self) -> PathBuf {
        self.output_folder.join(crate::summary::SUMMARY_FILE_NAME)
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }
}
