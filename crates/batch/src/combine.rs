//! Merging two per-layer results into fixed-schema records

use crate::aggregate::ZonalResult;
use crate::error::{BatchError, Result};
use zonestat_algorithms::ZonalStats;
use zonestat_core::AttributeValue;

/// Statistic names written for each layer, in output order
pub const STAT_KEYS: [&str; 5] = ["mean", "min", "max", "std", "count"];

/// One layer's statistics for one feature
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStatistics {
    pub prefix: String,
    pub stats: ZonalStats,
}

impl LayerStatistics {
    /// The five `<prefix>_<stat>` attributes; empty statistics are explicit nulls
    pub fn attributes(&self) -> [(String, AttributeValue); 5] {
        let s = &self.stats;
        let key = |stat: &str| format!("{}_{}", self.prefix, stat);
        let [mean, min, max, std_dev, count] = STAT_KEYS;
        [
            (key(mean), AttributeValue::from_optional(s.mean)),
            (key(min), AttributeValue::from_optional(s.min)),
            (key(max), AttributeValue::from_optional(s.max)),
            (key(std_dev), AttributeValue::from_optional(s.std)),
            (key(count), AttributeValue::Int(s.count as i64)),
        ]
    }
}

/// The combined statistics of one feature
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    /// Position of the feature in its file
    pub index: usize,
    pub layer_a: LayerStatistics,
    pub layer_b: LayerStatistics,
}

impl CombinedRecord {
    /// Flatten to the 10 statistic attributes, layer A first
    pub fn attributes(&self) -> Vec<(String, AttributeValue)> {
        self.layer_a
            .attributes()
            .into_iter()
            .chain(self.layer_b.attributes())
            .collect()
    }
}

/// Pair the two layers' statistics feature by feature.
///
/// Both results must hold exactly one entry per feature.
pub fn combine(
    layer_a: ZonalResult,
    layer_b: ZonalResult,
    feature_count: usize,
) -> Result<Vec<CombinedRecord>> {
    if layer_a.len() != feature_count || layer_b.len() != feature_count {
        return Err(BatchError::CombinerMismatch {
            layer_a: layer_a.len(),
            layer_b: layer_b.len(),
            features: feature_count,
        });
    }

    let ZonalResult {
        prefix: prefix_a,
        stats: stats_a,
    } = layer_a;
    let ZonalResult {
        prefix: prefix_b,
        stats: stats_b,
    } = layer_b;

    Ok(stats_a
        .into_iter()
        .zip(stats_b)
        .enumerate()
        .map(|(index, (a, b))| CombinedRecord {
            index,
            layer_a: LayerStatistics {
                prefix: prefix_a.clone(),
                stats: a,
            },
            layer_b: LayerStatistics {
                prefix: prefix_b.clone(),
                stats: b,
            },
        })
        .collect())
}
