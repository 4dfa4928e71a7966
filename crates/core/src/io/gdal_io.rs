//! Raster and vector reading through GDAL/OGR

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use crate::vector::{AttributeValue, Feature, FeatureId, VectorDataset};
use gdal::raster::GdalType;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{FieldValue, LayerAccess};
use gdal::Dataset;
use std::path::Path;

fn crs_from_spatial_ref(srs: &SpatialRef) -> Option<CRS> {
    if let Ok(code) = srs.auth_code() {
        if let Ok(code) = u32::try_from(code) {
            return Some(CRS::from_epsg(code));
        }
    }
    srs.to_wkt().ok().map(CRS::from_wkt)
}

/// Read the first band of any GDAL-supported raster
///
/// # Example
/// ```ignore
/// let raster: Raster<f64> = read_geotiff("ohm.img")?;
/// ```
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let rasterband = dataset.rasterband(1)?;

    let (cols, rows) = dataset.raster_size();

    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;

    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        raster.set_crs(crs_from_spatial_ref(&srs));
    }

    if let Some(nodata) = rasterband.no_data_value() {
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

/// Read the first layer of an OGR vector source (Shapefile, GeoPackage,
/// KML, GML, ...).
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let dataset = Dataset::open(path.as_ref())?;
    let mut layer = dataset.layer(0)?;

    let crs = layer.spatial_ref().and_then(|srs| crs_from_spatial_ref(&srs));
    let mut out = VectorDataset::new(crs);

    for feature in layer.features() {
        let geometry = match feature.geometry() {
            Some(g) => Some(
                g.to_geo()
                    .map_err(|e| Error::Gdal(format!("feature geometry: {}", e)))?,
            ),
            None => None,
        };

        let mut converted = Feature {
            geometry,
            id: feature
                .fid()
                .map(|fid| FeatureId::Number(serde_json::Number::from(fid))),
            ..Feature::default()
        };
        for (name, value) in feature.fields() {
            converted.set_property(name, value.map_or(AttributeValue::Null, field_to_attribute));
        }
        out.push(converted);
    }

    Ok(out)
}

fn field_to_attribute(value: FieldValue) -> AttributeValue {
    match value {
        FieldValue::IntegerValue(v) => AttributeValue::Int(v as i64),
        FieldValue::Integer64Value(v) => AttributeValue::Int(v),
        FieldValue::RealValue(v) => AttributeValue::Float(v),
        FieldValue::StringValue(v) => AttributeValue::String(v),
        FieldValue::IntegerListValue(v) => AttributeValue::Json(serde_json::json!(v)),
        FieldValue::Integer64ListValue(v) => AttributeValue::Json(serde_json::json!(v)),
        FieldValue::RealListValue(v) => AttributeValue::Json(serde_json::json!(v)),
        FieldValue::StringListValue(v) => AttributeValue::Json(serde_json::json!(v)),
        FieldValue::DateValue(v) => AttributeValue::String(v.to_string()),
        FieldValue::DateTimeValue(v) => AttributeValue::String(v.to_rfc3339()),
    }
}
