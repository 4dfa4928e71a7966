//! GeoJSON vector reading and writing
//!
//! Reads FeatureCollections (and single Features or Geometries) into a
//! `VectorDataset`, keeping attribute order and the legacy `crs` member.
//! Writes pretty-printed FeatureCollections with a `crs` member naming the
//! EPSG code as an OGC URN, or the WKT / PROJ text when no code is known.
//!
//! Geometries are two-dimensional: Z and M ordinates of the input are
//! dropped on reading, with a warning.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Attributes, Feature, FeatureId, VectorDataset};
use geojson::{feature::Id, GeoJson, JsonObject, JsonValue};
use std::path::Path;

/// Read a GeoJSON file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_geojson(&text)
}

/// Parse GeoJSON text.
///
/// A document without a `crs` member is WGS84 (RFC 7946); an explicit
/// `"crs": null` leaves the CRS undefined.
pub fn parse_geojson(text: &str) -> Result<VectorDataset> {
    let geojson: GeoJson = text.parse()?;
    if has_extra_ordinates(&geojson) {
        tracing::warn!("dropping Z/M ordinates; only x and y are kept");
    }

    match geojson {
        GeoJson::FeatureCollection(fc) => {
            let crs = crs_member(fc.foreign_members.as_ref());
            let mut dataset = VectorDataset::new(crs);
            for (i, feature) in fc.features.into_iter().enumerate() {
                dataset.push(convert_feature(feature).map_err(|e| {
                    Error::GeoJson(format!("feature {}: {}", i, e))
                })?);
            }
            Ok(dataset)
        }
        GeoJson::Feature(feature) => {
            let crs = crs_member(feature.foreign_members.as_ref());
            let mut dataset = VectorDataset::new(crs);
            dataset.push(convert_feature(feature)?);
            Ok(dataset)
        }
        GeoJson::Geometry(geometry) => {
            let crs = crs_member(geometry.foreign_members.as_ref());
            let mut dataset = VectorDataset::new(crs);
            dataset.push(Feature::new(geo_types::Geometry::<f64>::try_from(geometry)?));
            Ok(dataset)
        }
    }
}

fn has_extra_ordinates(geojson: &GeoJson) -> bool {
    fn extra(v: &geojson::Value) -> bool {
        use geojson::Value::*;
        match v {
            Point(p) => p.len() > 2,
            MultiPoint(line) | LineString(line) => line.iter().any(|p| p.len() > 2),
            MultiLineString(lines) | Polygon(lines) => {
                lines.iter().flatten().any(|p| p.len() > 2)
            }
            MultiPolygon(polygons) => polygons.iter().flatten().flatten().any(|p| p.len() > 2),
            GeometryCollection(geometries) => geometries.iter().any(|g| extra(&g.value)),
        }
    }
    fn geometry(g: Option<&geojson::Geometry>) -> bool {
        g.map_or(false, |g| extra(&g.value))
    }

    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.iter().any(|f| geometry(f.geometry.as_ref())),
        GeoJson::Feature(f) => geometry(f.geometry.as_ref()),
        GeoJson::Geometry(g) => geometry(Some(g)),
    }
}

fn crs_member(members: Option<&JsonObject>) -> Option<CRS> {
    let member = match members.and_then(|m| m.get("crs")) {
        None => return Some(CRS::wgs84()),
        Some(JsonValue::Null) => return None,
        Some(member) => member,
    };

    let properties = member.get("properties");
    match member.get("type").and_then(JsonValue::as_str) {
        Some("name") => {
            if let Some(name) = properties.and_then(|p| p.get("name")).and_then(JsonValue::as_str) {
                return Some(CRS::parse(name));
            }
        }
        Some("EPSG") => {
            if let Some(code) = properties.and_then(|p| p.get("code")).and_then(JsonValue::as_u64) {
                return u32::try_from(code).ok().map(CRS::from_epsg);
            }
        }
        _ => {}
    }

    tracing::warn!("unrecognised GeoJSON crs member {}, treating CRS as undefined", member);
    None
}

fn convert_feature(feature: geojson::Feature) -> Result<Feature> {
    let geometry = feature
        .geometry
        .map(geo_types::Geometry::<f64>::try_from)
        .transpose()?;

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, json_to_attribute(v)))
        .collect::<Attributes>();

    let id = feature.id.map(|id| match id {
        Id::String(s) => FeatureId::Text(s),
        Id::Number(n) => FeatureId::Number(n),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn json_to_attribute(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::Int(i)
            } else if n.is_f64() {
                n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float)
            } else {
                AttributeValue::Json(JsonValue::Number(n))
            }
        }
        JsonValue::String(s) => AttributeValue::String(s),
        other => AttributeValue::Json(other),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        // NaN and infinities have no JSON form
        AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
            .map_or(JsonValue::Null, JsonValue::Number),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
        AttributeValue::Json(v) => v.clone(),
    }
}

/// Serialize a dataset as a pretty-printed GeoJSON FeatureCollection
pub fn to_geojson_string(dataset: &VectorDataset) -> Result<String> {
    let features = dataset
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: feature.id.as_ref().map(|id| match id {
                FeatureId::Text(s) => Id::String(s.clone()),
                FeatureId::Number(n) => Id::Number(n.clone()),
            }),
            properties: Some(
                feature
                    .properties
                    .iter()
                    .map(|(k, v)| (k.to_string(), attribute_to_json(v)))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let foreign_members = dataset.crs.as_ref().and_then(crs_name).map(|name| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({ "type": "name", "properties": { "name": name } }),
        );
        members
    });

    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };

    Ok(serde_json::to_string_pretty(&collection)?)
}

/// OGC URN, else the defining text
fn crs_name(crs: &CRS) -> Option<String> {
    if let Some(urn) = crs.ogc_urn() {
        return Some(urn);
    }
    let text = crs.proj().or_else(|| crs.wkt())?;
    tracing::warn!("CRS {} has no EPSG code; writing its definition as the crs name", crs);
    Some(text.to_string())
}

/// Write a dataset to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(dataset: &VectorDataset, path: P) -> Result<()> {
    let mut text = to_geojson_string(dataset)?;
    text.push('\n');
    std::fs::write(path.as_ref(), text)?;
    Ok(())
}
