//! Study area to SQL geometry expression.

use crate::error::{BiodivError, Result};
use crate::models::{Crs, StudyArea, StudyFeature};
use geo::{Area, Geometry};
use wkt::ToWkt;

/// Turns a study area into one SQL expression: the union of its polygons,
/// reprojected into the analysis CRS by the database.
#[derive(Debug, Clone, Copy)]
pub struct SpatialPredicateBuilder {
    target: Crs,
}

impl SpatialPredicateBuilder {
    pub fn new(target: Crs) -> Self {
        Self { target }
    }

    /// Build the union expression.
    ///
    /// One feature yields `(select st_union(<geom>))`, several yield
    /// `(select st_union(array[<geom>, ...]))`. Features keep their input
    /// order so the output is stable across runs.
    pub fn build(&self, area: &StudyArea) -> Result<String> {
        let source = area.crs()?;

        if area.is_empty() {
            return Err(BiodivError::EmptyStudyArea);
        }

        let geometries = area
            .features
            .iter()
            .map(|feature| self.feature_expression(feature, source))
            .collect::<Result<Vec<_>>>()?;

        let predicate = match geometries.as_slice() {
            [single] => format!("(select st_union({}))", single),
            many => format!("(select st_union(array[{}]))", many.join(", ")),
        };

        tracing::debug!(
            "Spatial predicate for '{}': {} feature(s), {} -> {}",
            area.name,
            geometries.len(),
            source,
            self.target
        );

        Ok(predicate)
    }

    fn feature_expression(&self, feature: &StudyFeature, source: Crs) -> Result<String> {
        let (constructor, wkt) = match &feature.geometry {
            Geometry::Polygon(polygon) => ("ST_PolygonFromText", polygon.wkt_string()),
            Geometry::MultiPolygon(multi) => ("ST_MultiPolygonFromText", multi.wkt_string()),
            other => {
                return Err(BiodivError::InvalidStudyGeometry {
                    feature_id: feature.id.clone(),
                    reason: format!("expected Polygon or MultiPolygon, got {}", geometry_name(other)),
                })
            }
        };

        if feature.geometry.unsigned_area() == 0.0 {
            tracing::warn!("Study area feature {} has zero area", feature.id);
        }

        let geometry = format!("{}('{}', {})", constructor, wkt, source.epsg);
        if source == self.target {
            Ok(geometry)
        } else {
            Ok(format!("ST_Transform({}, {})", geometry, self.target.epsg))
        }
    }
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
