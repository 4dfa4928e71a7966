//! Statistical aggregation of raster data
//!
//! - **zonal**: statistics of the pixels covered by vector geometries

pub mod zonal;

pub use zonal::{zonal_statistics, CoverageRule, PixelSampler, ZonalAggregation, ZonalStats};
