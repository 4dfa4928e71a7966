//! # zonestat Algorithms
//!
//! The zonal aggregation capability used by the batch pipeline.
//!
//! - **statistics::zonal**: `ZonalAggregation` trait, the `PixelSampler`
//!   implementation (center-point or all-touched coverage) and an
//!   order-preserving per-file driver, parallel with the `parallel` feature.

mod maybe_rayon;
pub mod statistics;

pub use statistics::{zonal_statistics, CoverageRule, PixelSampler, ZonalAggregation, ZonalStats};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::statistics::{
        zonal_statistics, CoverageRule, PixelSampler, ZonalAggregation, ZonalStats,
    };
    pub use zonestat_core::prelude::*;
}
