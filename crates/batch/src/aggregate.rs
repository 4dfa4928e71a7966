//! Per-layer zonal aggregation of one file's geometries

use crate::error::{BatchError, Result};
use crate::layer::RasterLayer;
use geo::Geometry;
use std::borrow::Cow;
use tracing::{debug, warn};
use zonestat_algorithms::{zonal_statistics, ZonalAggregation, ZonalStats};
use zonestat_core::{Error, Transformer, CRS};

/// Statistics of every feature of one file on one layer, by position
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalResult {
    pub prefix: String,
    pub stats: Vec<ZonalStats>,
}

impl ZonalResult {
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Drives the zonal aggregation capability for one raster layer
pub struct ZonalAggregator<'a> {
    layer: &'a RasterLayer,
    capability: &'a dyn ZonalAggregation,
}

impl<'a> ZonalAggregator<'a> {
    pub fn new(layer: &'a RasterLayer, capability: &'a dyn ZonalAggregation) -> Self {
        Self { layer, capability }
    }

    /// Aggregate geometries given in `geometry_crs`.
    ///
    /// Geometries are moved into the layer's CRS first when it differs.
    /// Invalid geometries, and geometries that cannot be expressed in the
    /// layer's CRS, get empty statistics and a warning; any other failure of
    /// the capability fails the file.
    pub fn aggregate(
        &self,
        geometries: &[Option<Geometry<f64>>],
        geometry_crs: &CRS,
    ) -> Result<ZonalResult> {
        let prefix = self.layer.prefix();
        let aligned = self.align(geometries, geometry_crs)?;

        debug!(
            "sampling {} geometries on layer {} ({:?})",
            aligned.len(),
            prefix,
            self.capability.coverage()
        );

        let results = zonal_statistics(
            self.capability,
            self.layer.raster(),
            self.layer.nodata(),
            &aligned,
        );

        let stats = results
            .into_iter()
            .enumerate()
            .map(|(i, result)| match result {
                Ok(stats) => Ok(stats),
                Err(Error::InvalidGeometry(reason)) => {
                    warn!("feature {}: {} on layer {}, statistics left empty", i, reason, prefix);
                    Ok(ZonalStats::empty())
                }
                Err(e) => Err(BatchError::Aggregation {
                    layer: prefix.to_string(),
                    reason: format!("feature {}: {}", i, e),
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ZonalResult {
            prefix: prefix.to_string(),
            stats,
        })
    }

    fn align<'g>(
        &self,
        geometries: &'g [Option<Geometry<f64>>],
        geometry_crs: &CRS,
    ) -> Result<Cow<'g, [Option<Geometry<f64>>]>> {
        let Some(layer_crs) = self.layer.crs() else {
            return Ok(Cow::Borrowed(geometries));
        };
        if layer_crs.is_equivalent(geometry_crs) {
            return Ok(Cow::Borrowed(geometries));
        }

        let transformer = Transformer::new(geometry_crs, layer_crs).map_err(|e| {
            BatchError::CrsResolution(format!(
                "cannot align geometries in {} with {} layer in {}: {}",
                geometry_crs,
                self.layer.prefix(),
                layer_crs,
                e
            ))
        })?;
        debug!("aligning geometries {} -> {} for layer {}", geometry_crs, layer_crs, self.layer.prefix());

        // A geometry that cannot be expressed in the layer CRS cannot overlap it
        let aligned = geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| {
                geometry.as_ref().and_then(|g| match transformer.transform_geometry(g) {
                    Ok(moved) => Some(moved),
                    Err(e) => {
                        warn!("feature {}: {} on layer {}", i, e, self.layer.prefix());
                        None
                    }
                })
            })
            .collect();

        Ok(Cow::Owned(aligned))
    }
}
