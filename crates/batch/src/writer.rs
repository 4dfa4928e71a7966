//! Output naming and GeoJSON result files

use crate::combine::CombinedRecord;
use crate::error::{BatchError, Result};
use crate::resolver::ResolvedGeometries;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use zonestat_core::VectorDataset;

/// Output file names handed out during one run.
///
/// `<stem><suffix>.geojson`; a name already used in the run gets `_2`,
/// `_3`, ... appended.
#[derive(Debug)]
pub struct OutputNames {
    folder: PathBuf,
    suffix: String,
    used: HashSet<PathBuf>,
}

impl OutputNames {
    pub fn new(folder: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            suffix: suffix.into(),
            used: HashSet::new(),
        }
    }

    /// Reserve the output path for an input file
    pub fn allocate(&mut self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let base = format!("{}{}", stem, self.suffix);

        let mut candidate = self.folder.join(format!("{}.geojson", base));
        let mut n = 2;
        while self.used.contains(&candidate) {
            candidate = self.folder.join(format!("{}_{}.geojson", base, n));
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Write one file's enriched features.
///
/// Each output feature keeps its id and attributes in their original order,
/// takes its geometry from `resolved` and gains the 10 statistic attributes;
/// a statistic replaces a same-named original attribute in place. Returns
/// the number of features written.
pub fn write_result(
    dataset: VectorDataset,
    resolved: ResolvedGeometries,
    records: &[CombinedRecord],
    path: &Path,
) -> Result<usize> {
    let write_error = |reason: String| BatchError::Write {
        path: path.to_path_buf(),
        reason,
    };

    if resolved.geometries.len() != dataset.len() || records.len() != dataset.len() {
        return Err(BatchError::CombinerMismatch {
            layer_a: records.len(),
            layer_b: records.len(),
            features: dataset.len(),
        });
    }

    let mut output = VectorDataset::new(Some(resolved.crs));
    for ((mut feature, geometry), record) in dataset
        .features
        .into_iter()
        .zip(resolved.geometries)
        .zip(records)
    {
        feature.geometry = geometry;
        for (key, value) in record.attributes() {
            feature.set_property(key, value);
        }
        output.push(feature);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
    }
    zonestat_core::io::write_geojson(&output, path).map_err(|e| write_error(e.to_string()))?;

    debug!("wrote {} features to {}", output.len(), path.display());
    Ok(output.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::LayerStatistics;
    use geo::{Geometry, Point};
    use serde_json::Value;
    use tempfile::TempDir;
    use zonestat_algorithms::ZonalStats;
    use zonestat_core::{AttributeValue, Feature, CRS};

    fn record(index: usize, stats: ZonalStats) -> CombinedRecord {
        CombinedRecord {
            index,
            layer_a: LayerStatistics {
                prefix: "ohm".into(),
                stats,
            },
            layer_b: LayerStatistics {
                prefix: "slope".into(),
                stats: ZonalStats::empty(),
            },
        }
    }

    #[test]
    fn names_are_unique_within_a_run() {
        let mut names = OutputNames::new("/out", "_zonal_stats");
        assert_eq!(
            names.allocate(Path::new("/in/a/parcels.geojson")),
            PathBuf::from("/out/parcels_zonal_stats.geojson")
        );
        assert_eq!(
            names.allocate(Path::new("/in/b/parcels.shp")),
            PathBuf::from("/out/parcels_zonal_stats_2.geojson")
        );
        assert_eq!(
            names.allocate(Path::new("/in/c/parcels.json")),
            PathBuf::from("/out/parcels_zonal_stats_3.geojson")
        );
        assert_eq!(
            names.allocate(Path::new("/in/fields.gpkg")),
            PathBuf::from("/out/fields_zonal_stats.geojson")
        );
    }

    #[test]
    fn writes_attributes_then_statistics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.geojson");

        let mut dataset = VectorDataset::new(Some(CRS::wgs84()));
        let mut feature = Feature::new(Geometry::Point(Point::new(-3.7, 40.4)));
        feature.set_property("name", AttributeValue::String("plot".into()));
        feature.set_property("ohm_max", AttributeValue::Int(99));
        feature.set_property("area", AttributeValue::Float(1.5));
        dataset.push(feature);

        let resolved = ResolvedGeometries {
            crs: CRS::from_epsg(32630),
            geometries: vec![Some(Geometry::Point(Point::new(440_000.0, 4_470_000.0)))],
        };
        let records = [record(0, ZonalStats::from_values(&[4.0]))];

        let written = write_result(dataset, resolved, &records, &path).unwrap();
        assert_eq!(written, 1);

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::32630");

        let feature = &json["features"][0];
        assert_eq!(feature["geometry"]["coordinates"][0], 440_000.0);

        let props = feature["properties"].as_object().unwrap();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "name", "ohm_max", "area", "ohm_mean", "ohm_min", "ohm_std", "ohm_count",
                "slope_mean", "slope_min", "slope_max", "slope_std", "slope_count",
            ]
        );
        assert_eq!(props["ohm_max"], 4.0);
        assert_eq!(props["ohm_count"], 1);
        assert_eq!(props["slope_mean"], Value::Null);
        assert_eq!(props["slope_count"], 0);
    }

    #[test]
    fn mismatched_records_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut dataset = VectorDataset::new(None);
        dataset.push(Feature::default());
        let resolved = ResolvedGeometries {
            crs: CRS::wgs84(),
            geometries: vec![None],
        };

        let err = write_result(dataset, resolved, &[], &dir.path().join("x.geojson")).unwrap_err();
        assert!(matches!(err, BatchError::CombinerMismatch { .. }));
        assert!(!dir.path().join("x.geojson").exists());
    }
}
