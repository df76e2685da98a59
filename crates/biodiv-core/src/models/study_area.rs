//! Study area: the polygons observations are intersected with.

use crate::models::geometry::Crs;
use crate::error::Result;
use geo::Geometry;

/// A single study-area feature
#[derive(Debug, Clone, PartialEq)]
pub struct StudyFeature {
    pub id: String,
    pub geometry: Geometry<f64>,
}

impl StudyFeature {
    pub fn new(id: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        Self { id: id.into(), geometry: geometry.into() }
    }
}

/// Polygon feature collection plus the authority id of its CRS
///
/// The CRS is kept as the raw authority string (`EPSG:2154`); it is only
/// checked when the spatial predicate is built.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyArea {
    pub name: String,
    pub crs: String,
    pub features: Vec<StudyFeature>,
}

impl StudyArea {
    pub fn new(name: impl Into<String>, crs: impl Into<String>) -> Self {
        Self { name: name.into(), crs: crs.into(), features: Vec::new() }
    }

    pub fn with_feature(mut self, feature: StudyFeature) -> Self {
        self.features.push(feature);
        self
    }

    /// Parse and check the CRS identifier
    pub fn crs(&self) -> Result<Crs> {
        Crs::from_authid(&self.crs)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_crs_checked_on_demand() {
        let area = StudyArea::new("zone", "IGNF:LAMB93").with_feature(StudyFeature::new(
            "1",
            polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.0)],
        ));

        assert_eq!(area.len(), 1);
        assert!(area.crs().is_err());
        assert_eq!(StudyArea::new("zone", "EPSG:2154").crs().unwrap().epsg, 2154);
    }

    #[test]
    fn test_empty_area() {
        assert!(StudyArea::new("zone", "EPSG:2154").is_empty());
    }
}
