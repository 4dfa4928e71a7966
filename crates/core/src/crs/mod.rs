//! Coordinate Reference System handling

mod transform;

pub use transform::Transformer;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string.
    ///
    /// The EPSG code is taken from the outermost `AUTHORITY`/`ID` clause,
    /// or recognised from common ESRI names (`.prj` files carry no
    /// authority).
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        let wkt = wkt.into();
        let epsg = wkt_authority_code(&wkt).or_else(|| wkt_name_code(&wkt));
        Self {
            wkt: Some(wkt),
            epsg,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse a CRS identifier as found in vector files.
    ///
    /// Accepts `EPSG:<code>`, OGC URNs (`urn:ogc:def:crs:EPSG::<code>`,
    /// `urn:ogc:def:crs:EPSG:6.6:<code>`), the CRS84 URN, and bare codes.
    /// Anything else is kept as an opaque WKT/PROJ text.
    pub fn parse(identifier: &str) -> Self {
        let s = identifier.trim();
        let upper = s.to_ascii_uppercase();

        if upper.ends_with(":CRS84") || upper == "CRS84" {
            return Self::wgs84();
        }
        if let Some(code) = upper
            .strip_prefix("EPSG:")
            .and_then(|rest| rest.trim().parse::<u32>().ok())
        {
            return Self::from_epsg(code);
        }
        if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            if let Some(code) = upper.rsplit(':').next().and_then(|c| c.parse::<u32>().ok()) {
                return Self::from_epsg(code);
            }
        }
        if let Ok(code) = s.parse::<u32>() {
            return Self::from_epsg(code);
        }
        if s.starts_with('+') {
            return Self::from_proj(s);
        }
        Self::from_wkt(s)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// OGC URN for this CRS, when an EPSG code is known
    pub fn ogc_urn(&self) -> Option<String> {
        self.epsg.map(|code| format!("urn:ogc:def:crs:EPSG::{}", code))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Text comparison is imperfect but never produces false positives
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let cut = wkt
                .char_indices()
                .nth(50)
                .map(|(i, _)| i)
                .unwrap_or(wkt.len());
            return format!("WKT:{}", &wkt[..cut]);
        }
        "Unknown".to_string()
    }
}

/// `AUTHORITY["EPSG","32630"]` or `ID["EPSG",32630]` directly under the root
fn wkt_authority_code(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let start = ["AUTHORITY[\"EPSG\"", "ID[\"EPSG\""]
        .iter()
        .filter_map(|key| upper.rfind(key).map(|i| (i, key.len())))
        .max()?;

    let depth = upper[..start.0].chars().fold(0i32, |depth, c| match c {
        '[' | '(' => depth + 1,
        ']' | ')' => depth - 1,
        _ => depth,
    });
    if depth != 1 {
        return None;
    }

    let rest = &upper[start.0 + start.1..];
    let value = rest.trim_start().strip_prefix(',')?;
    let end = value.find([']', ','])?;
    value[..end].trim().trim_matches('"').parse().ok()
}

/// Root name of a WKT definition for WGS84 and its UTM / Web Mercator
/// projections, in both EPSG and ESRI spelling
fn wkt_name_code(wkt: &str) -> Option<u32> {
    let (keyword, rest) = wkt.trim_start().split_once('[')?;
    let name = rest.trim_start().strip_prefix('"')?.split('"').next()?;
    let name = name.to_ascii_uppercase().replace(['_', ' '], "");

    match keyword.trim().to_ascii_uppercase().as_str() {
        "GEOGCS" | "GEOGCRS" if name == "WGS84" || name == "GCSWGS1984" => Some(4326),
        "PROJCS" | "PROJCRS" => {
            if name.contains("PSEUDOMERCATOR") || name.contains("WEBMERCATOR") {
                return Some(3857);
            }
            let zone = name
                .strip_prefix("WGS84/UTMZONE")
                .or_else(|| name.strip_prefix("WGS1984UTMZONE"))?;
            let (digits, hemisphere) = zone.split_at(zone.len().checked_sub(1)?);
            let zone: u32 = digits.parse().ok().filter(|z| (1..=60).contains(z))?;
            match hemisphere {
                "N" => Some(32600 + zone),
                "S" => Some(32700 + zone),
                _ => None,
            }
        }
        _ => None,
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
