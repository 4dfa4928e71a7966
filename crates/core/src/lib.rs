//! # zonestat Core
//!
//! Core types and I/O for the zonestat zonal-statistics toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System identity and coordinate transforms
//! - `VectorDataset` / `Feature`: Vector features with ordered attributes
//! - I/O for GeoTIFF rasters and GeoJSON (plus OGR formats with `gdal`)

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{Transformer, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AttributeValue, Attributes, Feature, FeatureId, VectorDataset};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Transformer, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AttributeValue, Attributes, Feature, VectorDataset};
}
