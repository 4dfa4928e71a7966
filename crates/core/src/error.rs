//! Error types for zonestat

use thiserror::Error;

/// Main error type for zonestat core operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported vector format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid GeoJSON: {0}")]
    GeoJson(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for zonestat core operations
pub type Result<T> = std::result::Result<T, Error>;
