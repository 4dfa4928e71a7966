//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for TIFF I/O and interprets the GeoTIFF tags needed
//! for zonal statistics: pixel scale + tiepoint, the EPSG code and raster
//! type from the GeoKey directory, and the GDAL nodata tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

fn tiff_error(context: &str, e: tiff::TiffError) -> Error {
    Error::Other(format!("{}: {}", context, e))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| tiff_error("TIFF decode error", e))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| tiff_error("Cannot read dimensions", e))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| tiff_error("Cannot read image data", e))?;

    fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    }

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-band images decode interleaved; only single-band rasters are valid input
    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected a single-band raster of {}x{} cells, decoded {} samples",
            cols,
            rows,
            data.len()
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    let geokeys = read_geokeys(&mut decoder)?;

    if let Some(mut transform) = read_geotransform(&mut decoder)? {
        if geokey_value(&geokeys, GT_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
            // tie point names the centre of the first pixel
            shift_to_corner(&mut transform);
        }
        raster.set_transform(transform);
    }
    raster.set_crs(parse_geokey_epsg(&geokeys).map(CRS::from_epsg));
    raster.set_nodata(read_nodata(&mut decoder)?);

    Ok(raster)
}

fn read_f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<Vec<f64>>> {
    match decoder.find_tag(tag).map_err(|e| tiff_error("Cannot read tag", e))? {
        Some(value) => value
            .into_f64_vec()
            .map(Some)
            .map_err(|e| tiff_error("Malformed GeoTIFF tag", e)),
        None => Ok(None),
    }
}

/// GeoTransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoTransform>> {
    let scale = read_f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = read_f64_tag(decoder, Tag::ModelTiepointTag)?;

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1])));
        }
    }

    if let Some(m) = read_f64_tag(decoder, Tag::ModelTransformationTag)? {
        if m.len() >= 8 {
            // Row-major 4x4 matrix; only the 2D affine part is used
            return Ok(Some(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]])));
        }
    }

    Ok(None)
}

/// Move a PixelIsPoint origin half a pixel back to the outer corner
fn shift_to_corner(gt: &mut GeoTransform) {
    gt.origin_x -= 0.5 * (gt.pixel_width + gt.row_rotation);
    gt.origin_y -= 0.5 * (gt.col_rotation + gt.pixel_height);
}

/// Raw GeoKey directory; empty when the file has none
fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<u16>> {
    match decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|e| tiff_error("Cannot read GeoKey directory", e))?
    {
        Some(value) => value
            .into_u16_vec()
            .map_err(|e| tiff_error("Malformed GeoKey directory", e)),
        None => Ok(Vec::new()),
    }
}

/// Inline (location 0) key entries as `(key, value)`
fn inline_geokeys(keys: &[u16]) -> impl Iterator<Item = (u16, u16)> + '_ {
    let count = keys.get(3).copied().unwrap_or(0) as usize;
    keys.get(4..)
        .unwrap_or(&[])
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
}

fn geokey_value(keys: &[u16], key: u16) -> Option<u16> {
    inline_geokeys(keys).find(|&(k, _)| k == key).map(|(_, v)| v)
}

/// Find the projected or geographic CS code in a raw GeoKey directory.
///
/// User-defined systems have no EPSG identity.
fn parse_geokey_epsg(keys: &[u16]) -> Option<u32> {
    let mut projected = None;
    let mut geographic = None;
    for (key, value) in inline_geokeys(keys) {
        if value == 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => projected = Some(value as u32),
            GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            _ => {}
        }
    }

    projected.or(geographic)
}

fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Result<Option<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let text = match decoder
        .find_tag(Tag::GdalNodata)
        .map_err(|e| tiff_error("Cannot read nodata tag", e))?
    {
        Some(value) => value
            .into_string()
            .map_err(|e| tiff_error("Malformed nodata tag", e))?,
        None => return Ok(None),
    };

    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match trimmed.parse::<f64>() {
        Ok(v) => Ok(num_traits::cast(v)),
        Err(_) => {
            tracing::warn!("ignoring unparseable GDAL_NODATA value {:?}", trimmed);
            Ok(None)
        }
    }
}

/// Write a Raster to a single-band 64-bit float GeoTIFF.
///
/// Writes the geotransform, the EPSG code (when the raster's CRS has one)
/// and the nodata value, so the file reads back with the same metadata.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_error("TIFF encoder error", e))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_error("Cannot create TIFF image", e))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| tiff_error("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| tiff_error("Cannot write tiepoint tag", e))?;

    let geokeys = geokey_directory(raster.crs().and_then(|c| c.epsg()));
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tiff_error("Cannot write geokey tag", e))?;

    if let Some(nodata) = raster.nodata().and_then(|nd| nd.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| tiff_error("Cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_error("Cannot write image data", e))?;

    Ok(())
}

/// GeoKey directory declaring raster-pixel-is-area plus the CS code.
///
/// Codes 4000..5000 are written as geographic, everything else as projected.
fn geokey_directory(epsg: Option<u32>) -> Vec<u16> {
    let mut entries: Vec<[u16; 4]> = Vec::new();

    match epsg.and_then(|code| u16::try_from(code).ok()) {
        Some(code) if (4000..5000).contains(&code) => {
            entries.push([GT_MODEL_TYPE, 0, 1, 2]);
            entries.push([GT_RASTER_TYPE, 0, 1, 1]);
            entries.push([GEOGRAPHIC_TYPE, 0, 1, code]);
        }
        Some(code) => {
            entries.push([GT_MODEL_TYPE, 0, 1, 1]);
            entries.push([GT_RASTER_TYPE, 0, 1, 1]);
            entries.push([PROJECTED_CS_TYPE, 0, 1, code]);
        }
        None => {
            entries.push([GT_MODEL_TYPE, 0, 1, 1]);
            entries.push([GT_RASTER_TYPE, 0, 1, 1]);
        }
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}
