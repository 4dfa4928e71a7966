//! CRS resolution
//!
//! Picks the single target CRS of a file's output and reprojects the file's
//! geometries into it. Rasters are never reprojected.
//!
//! Priority: explicit EPSG, then the CRS both rasters share, then the
//! preferred raster's CRS (falling back to the other raster), then the
//! vector's own CRS.

use crate::config::RasterPrecedence;
use crate::error::{BatchError, Result};
use geo::{CoordsIter, Geometry};
use tracing::debug;
use zonestat_core::{Transformer, VectorDataset, CRS};

/// Geometries of one file in the target CRS, in feature order
#[derive(Debug, Clone)]
pub struct ResolvedGeometries {
    pub crs: CRS,
    pub geometries: Vec<Option<Geometry<f64>>>,
}

/// Target CRS policy for a run
#[derive(Debug, Clone)]
pub struct CrsResolver {
    explicit: Option<CRS>,
    precedence: RasterPrecedence,
}

impl CrsResolver {
    pub fn new(epsg: Option<u32>, precedence: RasterPrecedence) -> Self {
        Self {
            explicit: epsg.map(CRS::from_epsg),
            precedence,
        }
    }

    /// Decide the target CRS for a vector file
    pub fn target_crs(
        &self,
        vector: Option<&CRS>,
        layer_a: Option<&CRS>,
        layer_b: Option<&CRS>,
    ) -> Result<CRS> {
        if let Some(explicit) = &self.explicit {
            debug!("target CRS {} (explicit)", explicit);
            return Ok(explicit.clone());
        }

        let Some(vector) = vector else {
            return Err(BatchError::CrsResolution(
                "vector file defines no CRS and no target EPSG was given".into(),
            ));
        };

        if let (Some(a), Some(b)) = (layer_a, layer_b) {
            if a.is_equivalent(b) {
                debug!("target CRS {} (shared by both rasters)", a);
                return Ok(a.clone());
            }
        }

        let (preferred, other) = match self.precedence {
            RasterPrecedence::LayerA => (layer_a, layer_b),
            RasterPrecedence::LayerB => (layer_b, layer_a),
        };

        let target = preferred.or(other).unwrap_or(vector);
        debug!("target CRS {} ({:?} precedence)", target, self.precedence);
        Ok(target.clone())
    }

    /// Resolve the target CRS and reproject every geometry into it.
    ///
    /// A vector without a CRS is assumed to already be in the target CRS.
    pub fn resolve(
        &self,
        dataset: &VectorDataset,
        layer_a: Option<&CRS>,
        layer_b: Option<&CRS>,
    ) -> Result<ResolvedGeometries> {
        let target = self.target_crs(dataset.crs.as_ref(), layer_a, layer_b)?;

        let source = match &dataset.crs {
            Some(crs) => crs.clone(),
            None => {
                debug!("vector CRS undefined, assuming target CRS {}", target);
                target.clone()
            }
        };

        let geometries = reproject(dataset.geometries(), &source, &target)?;
        Ok(ResolvedGeometries {
            crs: target,
            geometries,
        })
    }
}

fn has_non_finite(geometry: &Geometry<f64>) -> bool {
    geometry
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
}

/// Reproject geometries between two CRSs.
///
/// Geometries with non-finite coordinates are passed through untouched so
/// the aggregator reports them per feature; any other failure fails the
/// whole set.
pub fn reproject<'a>(
    geometries: impl Iterator<Item = Option<&'a Geometry<f64>>>,
    source: &CRS,
    target: &CRS,
) -> Result<Vec<Option<Geometry<f64>>>> {
    let transformer = Transformer::new(source, target).map_err(|e| {
        BatchError::CrsResolution(format!("cannot transform {} to {}: {}", source, target, e))
    })?;

    geometries
        .enumerate()
        .map(|(i, geometry)| match geometry {
            None => Ok(None),
            Some(g) if has_non_finite(g) => Ok(Some(g.clone())),
            Some(g) => transformer.transform_geometry(g).map(Some).map_err(|e| {
                BatchError::CrsResolution(format!(
                    "feature {}: cannot reproject from {} to {}: {}",
                    i, source, target, e
                ))
            }),
        })
        .collect()
}
