//! Coordinate reference systems and observation geometry kinds.

use crate::error::{BiodivError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Crs {
    pub fn new(epsg: u32) -> Self {
        Self { epsg }
    }

    /// WGS 84 (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::new(4326)
    }

    /// RGF93 / Lambert 93 (EPSG:2154)
    pub fn lambert93() -> Self {
        Self::new(2154)
    }

    /// Parse an authority identifier such as `EPSG:2154`.
    ///
    /// Only the EPSG authority is accepted; anything else (OGC, IGNF, ESRI,
    /// a bare number) fails with `InvalidCoordinateSystem`.
    pub fn from_authid(authid: &str) -> Result<Self> {
        let invalid = || BiodivError::InvalidCoordinateSystem { crs: authid.to_string() };

        let (authority, code) = authid.trim().split_once(':').ok_or_else(invalid)?;
        if !authority.eq_ignore_ascii_case("EPSG") {
            return Err(invalid());
        }

        let epsg = code.trim().parse::<u32>().map_err(|_| invalid())?;
        if epsg == 0 {
            return Err(invalid());
        }

        Ok(Self::new(epsg))
    }

    pub fn authid(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Geometry kind of an observation, as offered to the user
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum GeometryKind {
    #[default]
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    pub const ALL: [GeometryKind; 3] =
        [GeometryKind::Point, GeometryKind::LineString, GeometryKind::Polygon];

    /// `ST_GeometryType` tokens stored in the `type_geom` column,
    /// single-part first
    pub fn db_tokens(&self) -> [&'static str; 2] {
        match self {
            GeometryKind::Point => ["ST_Point", "ST_MultiPoint"],
            GeometryKind::LineString => ["ST_LineString", "ST_MultiLineString"],
            GeometryKind::Polygon => ["ST_Polygon", "ST_MultiPolygon"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
        }
    }
}

impl FromStr for GeometryKind {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "point" | "points" => Ok(GeometryKind::Point),
            "linestring" | "line" | "lines" => Ok(GeometryKind::LineString),
            "polygon" | "polygons" => Ok(GeometryKind::Polygon),
            _ => Err(BiodivError::ConfigInvalid {
                key: "geometry_type".to_string(),
                reason: format!("Unknown geometry type: {}. Use point, line or polygon", s),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg_authid() {
        assert_eq!(Crs::from_authid("EPSG:2154").unwrap(), Crs::lambert93());
        assert_eq!(Crs::from_authid("epsg:4326").unwrap(), Crs::wgs84());
        assert_eq!(Crs::from_authid(" EPSG: 3857 ").unwrap().epsg, 3857);
    }

    #[test]
    fn test_non_epsg_authid_rejected() {
        for authid in ["OGC:CRS84", "IGNF:LAMB93", "2154", "EPSG:", "EPSG:abc", "EPSG:0", ""] {
            match Crs::from_authid(authid) {
                Err(BiodivError::InvalidCoordinateSystem { crs }) => assert_eq!(crs, authid),
                other => panic!("Expected InvalidCoordinateSystem for {:?}, got {:?}", authid, other),
            }
        }
    }

    #[test]
    fn test_geometry_kind_tokens() {
        assert_eq!(GeometryKind::Point.db_tokens(), ["ST_Point", "ST_MultiPoint"]);
        assert_eq!(GeometryKind::Polygon.db_tokens()[1], "ST_MultiPolygon");
    }

    #[test]
    fn test_parse_geometry_kind() {
        assert_eq!("Point".parse::<GeometryKind>().unwrap(), GeometryKind::Point);
        assert_eq!("line".parse::<GeometryKind>().unwrap(), GeometryKind::LineString);
        assert_eq!("POLYGON".parse::<GeometryKind>().unwrap(), GeometryKind::Polygon);
        assert!("circle".parse::<GeometryKind>().is_err());
    }
}
