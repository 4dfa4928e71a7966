//! Pure-Rust coordinate transforms.
//!
//! EPSG:4326 geographic lon/lat, EPSG:3857 Web Mercator and EPSG 326xx /
//! 327xx (UTM North / South) use closed-form formulas (Snyder 1987, USGS).
//! Any other EPSG code goes through `proj4rs` with the definition bundled
//! by `crs-definitions`, as does a CRS given as a PROJ string. No external
//! C dependencies (no libproj). Equivalent CRSs always transform as
//! identity, whatever their definition.

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj4rs::Proj;
use std::fmt;
use std::sync::Arc;

use super::CRS;
use crate::error::{Error, Result};

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Latitude limit of the spherical Web Mercator square
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;
/// UTM validity band
const UTM_MIN_LAT: f64 = -80.0;
const UTM_MAX_LAT: f64 = 84.0;
/// Distance from the central meridian beyond which the series diverges
const UTM_MAX_DLON: f64 = 9.0;

const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// A PROJ definition paired with WGS84 lon/lat, in `proj4rs` form
#[derive(Clone)]
struct ProjDefinition {
    definition: String,
    geographic: bool,
    proj: Arc<Proj>,
    wgs84: Arc<Proj>,
}

impl fmt::Debug for ProjDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProjDefinition").field(&self.definition).finish()
    }
}

impl ProjDefinition {
    fn from_epsg(code: u32) -> Result<Self> {
        let def = u16::try_from(code)
            .ok()
            .and_then(crs_definitions::from_code)
            .ok_or_else(|| Error::UnsupportedCrs(format!("EPSG:{} has no known definition", code)))?;
        Self::new(def.proj4)
    }

    fn new(definition: &str) -> Result<Self> {
        let parse = |text: &str| {
            Proj::from_proj_string(text)
                .map_err(|e| Error::UnsupportedCrs(format!("{}: {}", text, e)))
        };
        let proj = parse(definition)?;
        let wgs84 = parse(WGS84_LONGLAT)?;

        Ok(Self {
            definition: definition.to_string(),
            geographic: ["+proj=longlat", "+proj=latlong", "+proj=lonlat", "+proj=latlon"]
                .iter()
                .any(|p| definition.contains(p)),
            proj: Arc::new(proj),
            wgs84: Arc::new(wgs84),
        })
    }

    fn to_wgs84(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.geographic {
            (x.to_radians(), y.to_radians())
        } else {
            (x, y)
        };
        proj4rs::transform::transform(&self.proj, &self.wgs84, &mut point)
            .map_err(|e| Error::Reprojection(format!("({}, {}): {}", x, y, e)))?;
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    }

    fn from_wgs84(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let mut point = (lon.to_radians(), lat.to_radians());
        proj4rs::transform::transform(&self.wgs84, &self.proj, &mut point)
            .map_err(|e| Error::Reprojection(format!("({}, {}): {}", lon, lat, e)))?;
        if self.geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok(point)
        }
    }
}

#[derive(Debug, Clone)]
enum Projection {
    Geographic,
    WebMercator,
    Utm { zone: u32, north: bool },
    Proj(ProjDefinition),
}

impl Projection {
    fn from_crs(crs: &CRS) -> Result<Self> {
        if let Some(code) = crs.epsg() {
            return match code {
                4326 => Ok(Projection::Geographic),
                3857 | 900913 => Ok(Projection::WebMercator),
                _ => match parse_utm_epsg(code) {
                    Some((zone, north)) => Ok(Projection::Utm { zone, north }),
                    None => ProjDefinition::from_epsg(code).map(Projection::Proj),
                },
            };
        }

        match crs.proj() {
            Some(definition) => ProjDefinition::new(definition).map(Projection::Proj),
            None => Err(Error::UnsupportedCrs(format!(
                "{} has neither an EPSG code nor a PROJ definition",
                crs
            ))),
        }
    }

    /// Convert projected coordinates to (lon, lat) degrees
    fn to_geographic(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Projection::Geographic => {
                if !(-90.0..=90.0).contains(&y) || !(-180.0..=180.0).contains(&x) {
                    return Err(Error::Reprojection(format!(
                        "({}, {}) is not a valid longitude/latitude",
                        x, y
                    )));
                }
                Ok((x, y))
            }
            Projection::WebMercator => {
                let lon = (x / A).to_degrees();
                let lat = (2.0 * (y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
                Ok((lon, lat))
            }
            Projection::Utm { zone, north } => Ok(utm_to_wgs84(x, y, *zone, *north)),
            Projection::Proj(def) => def.to_wgs84(x, y),
        }
    }

    /// Convert (lon, lat) degrees to projected coordinates
    fn from_geographic(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        match self {
            Projection::Geographic => Ok((lon, lat)),
            Projection::WebMercator => {
                if lat.abs() > MERCATOR_MAX_LAT {
                    return Err(Error::Reprojection(format!(
                        "latitude {} outside Web Mercator domain",
                        lat
                    )));
                }
                let x = A * lon.to_radians();
                let y = A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                Ok((x, y))
            }
            Projection::Utm { zone, north } => {
                if !(UTM_MIN_LAT..=UTM_MAX_LAT).contains(&lat) {
                    return Err(Error::Reprojection(format!(
                        "latitude {} outside UTM domain",
                        lat
                    )));
                }
                let dlon = normalize_lon(lon - central_meridian(*zone));
                if dlon.abs() > UTM_MAX_DLON {
                    return Err(Error::Reprojection(format!(
                        "longitude {} too far from UTM zone {} central meridian",
                        lon, zone
                    )));
                }
                Ok(wgs84_to_utm(lon, lat, *zone, *north))
            }
            Projection::Proj(def) => def.from_wgs84(lon, lat),
        }
    }
}

/// Transforms coordinates and geometries from one CRS into another.
#[derive(Debug, Clone)]
pub struct Transformer {
    source: CRS,
    target: CRS,
    /// `None` for identity transforms
    steps: Option<(Projection, Projection)>,
}

impl Transformer {
    /// Build a transformer between two CRSs.
    ///
    /// Fails with [`Error::UnsupportedCrs`] when the CRSs differ and either
    /// side has no usable definition (unknown EPSG code, WKT-only).
    pub fn new(source: &CRS, target: &CRS) -> Result<Self> {
        let steps = if source.is_equivalent(target) {
            None
        } else {
            Some((Projection::from_crs(source)?, Projection::from_crs(target)?))
        };

        Ok(Self {
            source: source.clone(),
            target: target.clone(),
            steps,
        })
    }

    /// Source CRS
    pub fn source(&self) -> &CRS {
        &self.source
    }

    /// Target CRS
    pub fn target(&self) -> &CRS {
        &self.target
    }

    /// Whether this transformer leaves coordinates untouched
    pub fn is_identity(&self) -> bool {
        self.steps.is_none()
    }

    /// Transform a single coordinate pair
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::Reprojection(format!(
                "non-finite coordinate ({}, {})",
                x, y
            )));
        }

        let Some((from, to)) = &self.steps else {
            return Ok((x, y));
        };

        let (lon, lat) = from.to_geographic(x, y)?;
        let (tx, ty) = to.from_geographic(lon, lat)?;

        if !tx.is_finite() || !ty.is_finite() {
            return Err(Error::Reprojection(format!(
                "({}, {}) has no finite image in {}",
                x, y, self.target
            )));
        }
        Ok((tx, ty))
    }

    /// Transform every coordinate of a geometry
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c: Coord<f64>| {
            let (x, y) = self.transform(c.x, c.y)?;
            Ok::<_, Error>(Coord { x, y })
        })
    }
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub(crate) fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn normalize_lon(lon: f64) -> f64 {
    let mut l = lon;
    while l > 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}

// ── Core projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ─────

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon0 = central_meridian(zone).to_radians();
    let dlon = normalize_lon(lon_deg - central_meridian(zone)).to_radians();
    let lon = lon0 + dlon;

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Easting (Snyder eq. 8-9)
    let easting = K0
        * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Northing (Snyder eq. 8-10)
    let northing = K0
        * (m
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// Convert UTM (easting, northing) in metres to WGS84 (longitude, latitude)
/// in degrees. Snyder eqs. 8-12 to 8-25.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1_e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;

    // Footpoint latitude (Snyder eq. 3-26)
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone).to_radians()
        + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d5
                / 120.0)
            / cos_phi1;

    (normalize_lon(lon.to_degrees()), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Point};

    /// Helper: assert two values are within `tol` of each other.
    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn parse_utm_codes() {
        assert_eq!(parse_utm_epsg(32630), Some((30, true)));
        assert_eq!(parse_utm_epsg(32748), Some((48, false)));
        assert_eq!(parse_utm_epsg(32600), None);
        assert_eq!(parse_utm_epsg(32661), None);
        assert_eq!(parse_utm_epsg(4326), None);
    }

    // Reference values from pyproj (PROJ 9.x):
    //   Transformer.from_crs(4326, 32630, always_xy=True).transform(-3.7037, 40.4168)
    //   → (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let (e, n) = t.transform(-3.7037, 40.4168).unwrap();
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    // Buenos Aires → UTM 21S: (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32721)).unwrap();
        let (e, n) = t.transform(-58.3816, -34.6037).unwrap();
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn utm_inverse_roundtrip() {
        let fwd = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32748)).unwrap();
        let inv = Transformer::new(&CRS::from_epsg(32748), &CRS::wgs84()).unwrap();

        for &(lon, lat) in &[(106.8, -6.2), (105.1, -0.5), (107.9, -7.8)] {
            let (e, n) = fwd.transform(lon, lat).unwrap();
            let (lon2, lat2) = inv.transform(e, n).unwrap();
            assert_close(lon2, lon, 1e-7, "lon");
            assert_close(lat2, lat, 1e-7, "lat");
        }
    }

    #[test]
    fn web_mercator_roundtrip() {
        let fwd = Transformer::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let inv = Transformer::new(&CRS::web_mercator(), &CRS::wgs84()).unwrap();

        let (x, y) = fwd.transform(180.0, 0.0).unwrap();
        assert_close(x, 20_037_508.342_789_244, 1e-3, "x at antimeridian");
        assert_close(y, 0.0, 1e-6, "y at equator");

        let (x, y) = fwd.transform(-3.7037, 40.4168).unwrap();
        let (lon, lat) = inv.transform(x, y).unwrap();
        assert_close(lon, -3.7037, 1e-9, "lon");
        assert_close(lat, 40.4168, 1e-9, "lat");
    }

    #[test]
    fn utm_to_other_utm_zone() {
        let t = Transformer::new(&CRS::from_epsg(32630), &CRS::from_epsg(32631)).unwrap();
        // 3°E is the shared zone boundary: 30N easting there maps into 31N
        let (e, _) = t.transform(755_000.0, 4_500_000.0).unwrap();
        assert!(e < 500_000.0, "point east of 30N CM lands west of 31N CM, got {e}");
    }

    #[test]
    fn equivalent_crs_is_identity_even_if_unsupported() {
        let wkt = CRS::from_wkt("LOCAL_CS[\"grid\"]");
        let t = Transformer::new(&wkt, &wkt.clone()).unwrap();
        assert!(t.is_identity());
        assert_eq!(t.transform(12.5, -3.0).unwrap(), (12.5, -3.0));
    }

    #[test]
    fn unsupported_crs_is_rejected() {
        let local = CRS::from_wkt("LOCAL_CS[\"grid\"]");
        let err = Transformer::new(&local, &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs(_)));

        let err = Transformer::new(&CRS::from_epsg(999_999), &CRS::wgs84()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs(_)));
    }

    // Paris in RGF93 / Lambert-93 (EPSG:2154): (652469.02, 6862035.26)
    #[test]
    fn lambert93_from_bundled_definition() {
        let fwd = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(2154)).unwrap();
        let (x, y) = fwd.transform(2.3522, 48.8566).unwrap();
        assert_close(x, 652_469.02, 1.0, "easting");
        assert_close(y, 6_862_035.26, 1.0, "northing");

        let inv = Transformer::new(&CRS::from_epsg(2154), &CRS::wgs84()).unwrap();
        let (lon, lat) = inv.transform(x, y).unwrap();
        assert_close(lon, 2.3522, 1e-6, "lon");
        assert_close(lat, 48.8566, 1e-6, "lat");
    }

    #[test]
    fn proj_string_crs_and_mixed_paths() {
        let lambert = CRS::from_proj(
            "+proj=lcc +lat_0=46.5 +lon_0=3 +lat_1=49 +lat_2=44 +x_0=700000 +y_0=6600000 \
             +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
        );
        // projection origin
        let t = Transformer::new(&CRS::wgs84(), &lambert).unwrap();
        let (x, y) = t.transform(3.0, 46.5).unwrap();
        assert_close(x, 700_000.0, 0.01, "x at origin");
        assert_close(y, 6_600_000.0, 0.01, "y at origin");

        // UTM 31N to Lambert-93 passes through both implementations
        let utm = Transformer::new(&CRS::from_epsg(32631), &CRS::from_epsg(2154)).unwrap();
        let (e, n) = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32631))
            .unwrap()
            .transform(2.3522, 48.8566)
            .unwrap();
        let (x, y) = utm.transform(e, n).unwrap();
        assert_close(x, 652_469.02, 1.0, "easting");
        assert_close(y, 6_862_035.26, 1.0, "northing");
    }

    #[test]
    fn out_of_domain_fails() {
        let merc = Transformer::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        assert!(merc.transform(0.0, 89.0).is_err());

        let utm = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        assert!(utm.transform(-3.0, 86.0).is_err());
        assert!(utm.transform(60.0, 10.0).is_err());

        assert!(utm.transform(f64::NAN, 1.0).is_err());
        assert!(utm.transform(500.0, 1.0).is_err());
    }

    #[test]
    fn transform_geometry_maps_every_vertex() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::from_epsg(32630)).unwrap();
        let poly = polygon![
            (x: -3.71, y: 40.41),
            (x: -3.70, y: 40.41),
            (x: -3.70, y: 40.42),
            (x: -3.71, y: 40.41),
        ];
        let out = t.transform_geometry(&Geometry::Polygon(poly)).unwrap();
        let Geometry::Polygon(p) = out else {
            panic!("geometry type must be preserved");
        };
        assert_eq!(p.exterior().0.len(), 4);
        assert!(p.exterior().0.iter().all(|c| c.x > 400_000.0 && c.y > 4_000_000.0));

        let point = t.transform_geometry(&Geometry::Point(Point::new(-3.0, 0.0))).unwrap();
        let Geometry::Point(p) = point else {
            panic!("geometry type must be preserved");
        };
        assert_close(p.x(), 500_000.0, 0.01, "easting at CM");
    }

    #[test]
    fn transform_geometry_fails_on_any_bad_vertex() {
        let t = Transformer::new(&CRS::wgs84(), &CRS::web_mercator()).unwrap();
        let poly = polygon![
            (x: 0.0, y: 80.0),
            (x: 1.0, y: 80.0),
            (x: 1.0, y: 89.5),
            (x: 0.0, y: 80.0),
        ];
        assert!(t.transform_geometry(&Geometry::Polygon(poly)).is_err());
    }
}
