//! Raster layers opened once per run

use crate::config::LayerConfig;
use crate::error::{BatchError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zonestat_core::{Raster, CRS};

/// One raster input, held in memory and shared read-only by every file
#[derive(Debug)]
pub struct RasterLayer {
    path: PathBuf,
    prefix: String,
    raster: Raster<f64>,
    nodata: Option<f64>,
}

impl RasterLayer {
    /// Open a raster layer.
    ///
    /// The effective nodata is the raster's own nodata value, else
    /// `nodata_fallback`.
    pub fn open(config: &LayerConfig, nodata_fallback: Option<f64>) -> Result<Self> {
        let raster: Raster<f64> =
            zonestat_core::io::read_geotiff(&config.path).map_err(|source| BatchError::RasterOpen {
                path: config.path.clone(),
                source,
            })?;

        let layer = Self::from_raster(config, raster, nodata_fallback);

        let stats = layer.raster.statistics();
        let (rows, cols) = layer.raster.shape();
        info!(
            "Opened {} layer {}: {}x{} cells, CRS {}, nodata {:?}, {} valid cells (min {:?}, max {:?})",
            layer.prefix,
            layer.path.display(),
            cols,
            rows,
            layer.crs().map_or_else(|| "undefined".to_string(), |c| c.identifier()),
            layer.nodata,
            stats.valid_count,
            stats.min,
            stats.max,
        );
        if layer.crs().is_none() {
            warn!(
                "{} layer {} declares no CRS; geometries are sampled in the target CRS",
                layer.prefix,
                layer.path.display()
            );
        }

        Ok(layer)
    }

    /// Wrap an in-memory raster
    pub fn from_raster(config: &LayerConfig, raster: Raster<f64>, nodata_fallback: Option<f64>) -> Self {
        let nodata = raster.nodata().or(nodata_fallback);
        Self {
            path: config.path.clone(),
            prefix: config.prefix.clone(),
            raster,
            nodata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Attribute prefix, e.g. `ohm`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn raster(&self) -> &Raster<f64> {
        &self.raster
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.raster.crs()
    }

    /// Effective nodata value
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }
}
