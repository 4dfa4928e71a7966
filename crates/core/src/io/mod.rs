//! I/O operations for reading and writing geospatial data

#[cfg(feature = "gdal")]
mod gdal_io;
pub mod geojson;
mod native;
mod shp;

#[cfg(feature = "gdal")]
pub use gdal_io::read_geotiff;

#[cfg(not(feature = "gdal"))]
pub use native::read_geotiff;

// Fixtures and exports are always written natively so files are identical
// with and without GDAL.
pub use native::write_geotiff;

pub use self::geojson::{parse_geojson, read_geojson, to_geojson_string, write_geojson};
pub use shp::read_shapefile;

use crate::error::{Error, Result};
use crate::vector::VectorDataset;
use std::path::Path;

/// Vector formats accepted as input, by lowercase file extension
pub const VECTOR_EXTENSIONS: &[&str] = &["geojson", "json", "gpkg", "shp", "kml", "gml"];

/// Input formats read through OGR only
pub const GDAL_EXTENSIONS: &[&str] = &["gpkg", "kml", "gml"];

/// Whether this build can read files with the lowercase extension `ext`
pub fn can_read_extension(ext: &str) -> bool {
    VECTOR_EXTENSIONS.contains(&ext) && (cfg!(feature = "gdal") || !GDAL_EXTENSIONS.contains(&ext))
}

/// Lowercase extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Read a vector file, dispatching on its extension.
///
/// GeoJSON and Shapefile are read natively, in every build; the other OGR
/// formats require the `gdal` feature.
pub fn read_vector<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let path = path.as_ref();
    let ext = extension_of(path).unwrap_or_default();

    match ext.as_str() {
        "geojson" | "json" => read_geojson(path),
        "shp" => read_shapefile(path),
        #[cfg(feature = "gdal")]
        "gpkg" | "kml" | "gml" => gdal_io::read_vector(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "{} (extension {:?})",
            path.display(),
            ext
        ))),
    }
}
