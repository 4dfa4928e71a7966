//! Zonal statistics
//!
//! Aggregates the raster cells covered by a vector geometry into
//! count / mean / min / max / population standard deviation.
//!
//! Pixel inclusion is decided by a [`CoverageRule`]:
//! - `CenterPoint`: the pixel center lies strictly inside the polygon
//! - `AllTouched`: the pixel cell intersects the polygon
//!
//! Points sample the pixel containing them. Line geometries have no
//! footprint and are rejected with [`Error::InvalidGeometry`].

use crate::maybe_rayon::*;
use geo::{BoundingRect, Contains, CoordsIter, Geometry, Intersects, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use zonestat_core::raster::{Raster, RasterElement};
use zonestat_core::{Error, Result};

/// Pixel inclusion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageRule {
    /// Pixel center strictly inside the polygon
    #[default]
    CenterPoint,
    /// Any pixel whose cell intersects the polygon
    AllTouched,
}

/// Statistics of one geometry on one raster.
///
/// `count` is the number of valid (non-nodata) pixels sampled. When it is
/// zero, every other field is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ZonalStats {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
}

impl ZonalStats {
    /// Statistics of a geometry that covers no valid pixel
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute statistics from already-filtered valid values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::empty();
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        Self {
            count,
            mean: Some(mean),
            min: Some(min),
            max: Some(max),
            std: Some(var.sqrt()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Capability that turns one geometry and one raster into [`ZonalStats`].
///
/// Implementations report invalid geometries as [`Error::InvalidGeometry`];
/// any other error means the raster itself cannot be sampled.
pub trait ZonalAggregation: Send + Sync {
    /// Aggregate the valid pixels of `raster` covered by `geometry`.
    ///
    /// `nodata` is the effective nodata value; NaN cells are always skipped.
    /// The geometry must already be in the raster's CRS.
    fn aggregate(
        &self,
        raster: &Raster<f64>,
        nodata: Option<f64>,
        geometry: &Geometry<f64>,
    ) -> Result<ZonalStats>;

    /// The pixel inclusion rule this implementation applies
    fn coverage(&self) -> CoverageRule;
}

/// Geometry-to-pixel sampler over an in-memory raster
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelSampler {
    coverage: CoverageRule,
}

impl PixelSampler {
    pub fn new(coverage: CoverageRule) -> Self {
        Self { coverage }
    }

    /// Raster cells covered by a geometry, in row-major order, deduplicated
    pub fn covered_cells(
        &self,
        raster: &Raster<f64>,
        geometry: &Geometry<f64>,
    ) -> Result<Vec<(usize, usize)>> {
        if raster.transform().is_degenerate() {
            return Err(Error::InvalidParameter {
                name: "geotransform",
                value: format!("{:?}", raster.transform().to_gdal()),
                reason: "pixel size must be non-zero".into(),
            });
        }

        if geometry
            .coords_iter()
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(Error::InvalidGeometry("non-finite coordinate".into()));
        }

        let mut cells = BTreeSet::new();
        self.collect_cells(raster, geometry, &mut cells)?;
        Ok(cells.into_iter().collect())
    }

    fn collect_cells(
        &self,
        raster: &Raster<f64>,
        geometry: &Geometry<f64>,
        cells: &mut BTreeSet<(usize, usize)>,
    ) -> Result<()> {
        match geometry {
            Geometry::Point(p) => cells.extend(point_cell(raster, p)),
            Geometry::MultiPoint(mp) => cells.extend(mp.iter().filter_map(|p| point_cell(raster, p))),
            Geometry::Polygon(poly) => self.polygon_cells(raster, poly, cells),
            Geometry::MultiPolygon(mp) => {
                for poly in mp {
                    self.polygon_cells(raster, poly, cells);
                }
            }
            Geometry::Rect(r) => self.polygon_cells(raster, &r.to_polygon(), cells),
            Geometry::Triangle(t) => self.polygon_cells(raster, &t.to_polygon(), cells),
            Geometry::GeometryCollection(gc) => {
                for g in gc {
                    self.collect_cells(raster, g, cells)?;
                }
            }
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                return Err(Error::InvalidGeometry(
                    "line geometries cover no area".into(),
                ));
            }
        }
        Ok(())
    }

    fn polygon_cells(
        &self,
        raster: &Raster<f64>,
        polygon: &Polygon<f64>,
        cells: &mut BTreeSet<(usize, usize)>,
    ) {
        let Some(rect) = polygon.bounding_rect() else {
            return;
        };
        let Some(window) =
            raster.window_for_bounds(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        else {
            return;
        };

        let gt = raster.transform();
        for (row, col) in window.cells() {
            let covered = match self.coverage {
                CoverageRule::CenterPoint => {
                    let (x, y) = gt.pixel_to_geo(col, row);
                    polygon.contains(&Point::new(x, y))
                }
                CoverageRule::AllTouched => {
                    let [a, b, c, d] = gt.cell_corners(col, row);
                    let cell = Polygon::new(LineString::from(vec![a, b, c, d, a]), vec![]);
                    polygon.intersects(&cell)
                }
            };
            if covered {
                cells.insert((row, col));
            }
        }
    }
}

fn point_cell(raster: &Raster<f64>, point: &Point<f64>) -> Option<(usize, usize)> {
    let (col, row) = raster.geo_to_pixel(point.x(), point.y());
    let (col, row) = (col.floor(), row.floor());
    if col < 0.0 || row < 0.0 || col >= raster.cols() as f64 || row >= raster.rows() as f64 {
        return None;
    }
    Some((row as usize, col as usize))
}

impl ZonalAggregation for PixelSampler {
    fn aggregate(
        &self,
        raster: &Raster<f64>,
        nodata: Option<f64>,
        geometry: &Geometry<f64>,
    ) -> Result<ZonalStats> {
        let data = raster.data();
        let values: Vec<f64> = self
            .covered_cells(raster, geometry)?
            .into_iter()
            .filter_map(|(row, col)| data.get((row, col)).copied())
            .filter(|v| !v.is_nodata(nodata))
            .collect();

        Ok(ZonalStats::from_values(&values))
    }

    fn coverage(&self) -> CoverageRule {
        self.coverage
    }
}

/// Aggregate every geometry of one file against one raster.
///
/// Results are returned in input order; a missing geometry yields
/// `Err(Error::InvalidGeometry)` at its position. With the `parallel`
/// feature the geometries are sampled concurrently.
pub fn zonal_statistics<A>(
    aggregator: &A,
    raster: &Raster<f64>,
    nodata: Option<f64>,
    geometries: &[Option<Geometry<f64>>],
) -> Vec<Result<ZonalStats>>
where
    A: ZonalAggregation + ?Sized,
{
    geometries
        .into_par_iter()
        .map(|geometry| match geometry {
            Some(g) => aggregator.aggregate(raster, nodata, g),
            None => Err(Error::InvalidGeometry("missing geometry".into())),
        })
        .collect()
}
