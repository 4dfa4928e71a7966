//! ESRI Shapefile reading (without GDAL dependency)
//!
//! Shapes come from the `.shp` file, attributes from the `.dbf` sidecar in
//! field order, the CRS from the `.prj` sidecar. A missing `.dbf` gives
//! features without attributes; a missing `.prj` leaves the CRS undefined.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Attributes, Feature, VectorDataset};
use shapefile::dbase::{self, FieldValue};
use shapefile::{Shape, ShapeReader};
use std::fmt::Display;
use std::path::{Path, PathBuf};

fn shapefile_error(path: &Path, e: impl Display) -> Error {
    Error::Shapefile(format!("{}: {}", path.display(), e))
}

/// Read a `.shp` file and its sidecars
pub fn read_shapefile<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let path = path.as_ref();

    let shapes = ShapeReader::from_path(path)
        .and_then(|reader| reader.read())
        .map_err(|e| shapefile_error(path, e))?;

    let records = read_records(path)?;
    if let Some(records) = &records {
        if records.len() != shapes.len() {
            return Err(shapefile_error(
                path,
                format!("{} shapes but {} attribute records", shapes.len(), records.len()),
            ));
        }
    }

    let mut dataset = VectorDataset::new(read_prj(path)?);
    let mut records = records.map(Vec::into_iter);

    for (i, shape) in shapes.into_iter().enumerate() {
        let geometry = match shape {
            Shape::NullShape => None,
            shape => Some(geo_types::Geometry::<f64>::try_from(shape).map_err(|e| {
                Error::InvalidGeometry(format!("{}: shape {}: {:?}", path.display(), i, e))
            })?),
        };
        let properties = records
            .as_mut()
            .and_then(|r| r.next())
            .unwrap_or_default();

        dataset.push(Feature {
            geometry,
            properties,
            id: None,
        });
    }

    Ok(dataset)
}

/// `path` with another extension, in lower or upper case
fn sidecar(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

fn read_prj(path: &Path) -> Result<Option<CRS>> {
    let Some(prj) = sidecar(path, "prj") else {
        tracing::debug!("{} has no .prj file", path.display());
        return Ok(None);
    };

    let text = std::fs::read_to_string(&prj)?;
    let wkt = text.trim();
    if wkt.is_empty() {
        return Ok(None);
    }

    let crs = CRS::from_wkt(wkt);
    if crs.epsg().is_none() {
        tracing::warn!("{}: CRS has no recognisable EPSG code", prj.display());
    }
    Ok(Some(crs))
}

fn read_records(path: &Path) -> Result<Option<Vec<Attributes>>> {
    let Some(dbf) = sidecar(path, "dbf") else {
        tracing::warn!("{} has no .dbf file; features get no attributes", path.display());
        return Ok(None);
    };

    let mut reader = dbase::Reader::from_path(&dbf).map_err(|e| shapefile_error(&dbf, e))?;
    let names: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();
    let records = reader.read().map_err(|e| shapefile_error(&dbf, e))?;

    let attributes = records
        .into_iter()
        .map(|mut record| {
            names
                .iter()
                .filter_map(|name| {
                    record
                        .remove(name)
                        .map(|value| (name.clone(), field_to_attribute(value)))
                })
                .collect::<Attributes>()
        })
        .collect();

    Ok(Some(attributes))
}

fn field_to_attribute(value: FieldValue) -> AttributeValue {
    match value {
        // fixed-width fields are space padded
        FieldValue::Character(Some(s)) => AttributeValue::String(s.trim_end().to_string()),
        FieldValue::Memo(s) => AttributeValue::String(s),
        FieldValue::Numeric(Some(n)) | FieldValue::Double(n) | FieldValue::Currency(n) => {
            AttributeValue::Float(n)
        }
        FieldValue::Float(Some(f)) => AttributeValue::Float(f as f64),
        FieldValue::Integer(i) => AttributeValue::Int(i as i64),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(b),
        FieldValue::Date(Some(d)) => AttributeValue::String(format!(
            "{:04}-{:02}-{:02}",
            d.year(),
            d.month(),
            d.day()
        )),
        _ => AttributeValue::Null,
    }
}
