//! GeoJSON study-area reader

use std::fs;
use std::path::Path;

use geo::Geometry;

use crate::error::{BiodivError, Result};
use crate::models::{Crs, StudyArea, StudyFeature};

/// GeoJSON study-area reader
pub struct GeoJsonReader;

impl GeoJsonReader {
    pub fn read(&self, path: &Path) -> Result<StudyArea> {
        let content = fs::read_to_string(path)?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("study_area")
            .to_string();

        let area = self.parse(&name, &content)?;
        tracing::info!(
            "Loaded study area '{}' ({} feature(s), {})",
            area.name,
            area.len(),
            area.crs
        );
        Ok(area)
    }

    /// Parse GeoJSON text into a study area named `name`
    pub fn parse(&self, name: &str, content: &str) -> Result<StudyArea> {
        let geojson: geojson::GeoJson =
            content.parse().map_err(|e| BiodivError::ConfigInvalid {
                key: "study_area".to_string(),
                reason: format!("Failed to parse GeoJSON: {}", e),
            })?;

        match geojson {
            geojson::GeoJson::FeatureCollection(fc) => {
                let crs = declared_crs(fc.foreign_members.as_ref());

                let features = fc
                    .features
                    .iter()
                    .enumerate()
                    .map(|(idx, feature)| convert_feature(feature, idx))
                    .collect::<Result<Vec<_>>>()?;

                Ok(StudyArea { name: name.to_string(), crs, features })
            }
            geojson::GeoJson::Feature(feature) => {
                let crs = declared_crs(feature.foreign_members.as_ref());
                let feature = convert_feature(&feature, 0)?;
                Ok(StudyArea::new(name, crs).with_feature(feature))
            }
            geojson::GeoJson::Geometry(geometry) => {
                let crs = declared_crs(geometry.foreign_members.as_ref());
                let geometry = convert_geometry("0", geometry)?;
                Ok(StudyArea::new(name, crs).with_feature(StudyFeature::new("0", geometry)))
            }
        }
    }
}

fn convert_feature(feature: &geojson::Feature, idx: usize) -> Result<StudyFeature> {
    // Use the index when the feature has no id
    let id = feature
        .id
        .as_ref()
        .map(|id| match id {
            geojson::feature::Id::String(s) => s.clone(),
            geojson::feature::Id::Number(n) => n.to_string(),
        })
        .unwrap_or_else(|| idx.to_string());

    let geometry = feature.geometry.clone().ok_or_else(|| BiodivError::InvalidStudyGeometry {
        feature_id: id.clone(),
        reason: "feature has no geometry".to_string(),
    })?;

    let geometry = convert_geometry(&id, geometry)?;
    Ok(StudyFeature::new(id, geometry))
}

fn convert_geometry(id: &str, geometry: geojson::Geometry) -> Result<Geometry<f64>> {
    Geometry::<f64>::try_from(geometry).map_err(|e| BiodivError::InvalidStudyGeometry {
        feature_id: id.to_string(),
        reason: e.to_string(),
    })
}

/// CRS of a legacy GeoJSON `crs` member; WGS84 only when the member is absent.
///
/// A member that is present but unreadable is kept as raw JSON text, which
/// fails as a non-EPSG identifier when the CRS is resolved.
fn declared_crs(foreign_members: Option<&geojson::JsonObject>) -> String {
    match foreign_members.and_then(|members| members.get("crs")) {
        None => Crs::wgs84().authid(),
        Some(crs) => crs_authid(crs).unwrap_or_else(|| crs.to_string()),
    }
}

/// `{"type": "name", "properties": {"name": ...}}` or
/// `{"type": "EPSG", "properties": {"code": ...}}`
fn crs_authid(crs: &serde_json::Value) -> Option<String> {
    let properties = crs.get("properties")?;

    match crs.get("type")?.as_str()?.to_lowercase().as_str() {
        "name" => properties.get("name")?.as_str().map(normalize_crs),
        "epsg" => match properties.get("code")? {
            serde_json::Value::Number(code) => Some(format!("EPSG:{}", code)),
            serde_json::Value::String(code) => Some(format!("EPSG:{}", code.trim())),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize `urn:ogc:def:crs:EPSG::2154` and similar to `EPSG:2154`.
///
/// Names from other authorities are returned untouched and rejected later
/// when the CRS is resolved.
pub fn normalize_crs(name: &str) -> String {
    let upper = name.trim().to_uppercase();
    if let Some(rest) = upper.strip_prefix("URN:OGC:DEF:CRS:") {
        let mut parts = rest.split(':');
        let authority = parts.next().unwrap_or_default();
        let code = parts.filter(|p| !p.is_empty()).last().unwrap_or_default();
        return format!("{}:{}", authority, code);
    }
    name.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2154" } },
        "features": [
            {
                "type": "Feature",
                "id": "zone-1",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[700000, 6600000], [701000, 6600000], [701000, 6601000], [700000, 6601000], [700000, 6600000]]]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[702000, 6600000], [703000, 6600000], [703000, 6601000], [702000, 6600000]]]
                }
            }
        ]
    }"#;

    #[test]
    fn test_feature_collection_with_crs() {
        let area = GeoJsonReader.parse("zones", SQUARE).unwrap();

        assert_eq!(area.crs, "EPSG:2154");
        assert_eq!(area.crs().unwrap().epsg, 2154);
        assert_eq!(area.len(), 2);
        assert_eq!(area.features[0].id, "zone-1");
        // Index used when id is missing
        assert_eq!(area.features[1].id, "1");
    }

    #[test]
    fn test_missing_crs_defaults_to_wgs84() {
        let content = r#"{
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }
        }"#;

        let area = GeoJsonReader.parse("zone", content).unwrap();
        assert_eq!(area.crs, "EPSG:4326");
        assert_eq!(area.features[0].id, "0");
    }

    #[test]
    fn test_feature_crs_member_is_read() {
        let content = r#"{
            "type": "Feature",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2154" } },
            "properties": {},
            "geometry": { "type": "Polygon", "coordinates": [[[700000, 6600000], [701000, 6600000], [701000, 6601000], [700000, 6600000]]] }
        }"#;

        let area = GeoJsonReader.parse("zone", content).unwrap();
        assert_eq!(area.crs, "EPSG:2154");
    }

    #[test]
    fn test_geometry_crs_member_is_read() {
        let content = r#"{
            "type": "Polygon",
            "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
            "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
        }"#;

        let area = GeoJsonReader.parse("zone", content).unwrap();
        assert_eq!(area.crs, "EPSG:3857");
    }

    #[test]
    fn test_epsg_code_crs_member() {
        let content = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "EPSG", "properties": { "code": 2154 } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }
            }]
        }"#;

        let area = GeoJsonReader.parse("zone", content).unwrap();
        assert_eq!(area.crs, "EPSG:2154");
        assert_eq!(area.crs().unwrap().epsg, 2154);
    }

    #[test]
    fn test_unreadable_crs_member_is_rejected() {
        for crs in [
            r#"{ "type": "link", "properties": { "href": "http://example.com/crs/42", "type": "proj4" } }"#,
            r#"{ "type": "name", "properties": {} }"#,
            "null",
        ] {
            let content = format!(
                r#"{{
                    "type": "FeatureCollection",
                    "crs": {},
                    "features": [{{
                        "type": "Feature",
                        "properties": {{}},
                        "geometry": {{ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }}
                    }}]
                }}"#,
                crs
            );

            let area = GeoJsonReader.parse("zone", &content).unwrap();
            assert_ne!(area.crs, "EPSG:4326", "{}", crs);
            assert!(matches!(area.crs(), Err(BiodivError::InvalidCoordinateSystem { .. })), "{}", crs);
        }
    }

    #[test]
    fn test_feature_without_geometry_is_rejected() {
        let content = r#"{
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "id": 7, "properties": {}, "geometry": null }]
        }"#;

        let result = GeoJsonReader.parse("zone", content);
        assert!(matches!(
            result,
            Err(BiodivError::InvalidStudyGeometry { ref feature_id, .. }) if feature_id == "7"
        ));
    }

    #[test]
    fn test_normalize_crs() {
        assert_eq!(normalize_crs("urn:ogc:def:crs:EPSG::2154"), "EPSG:2154");
        assert_eq!(normalize_crs("urn:ogc:def:crs:OGC:1.3:CRS84"), "OGC:CRS84");
        assert_eq!(normalize_crs("EPSG:4326"), "EPSG:4326");
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commune.geojson");
        fs::write(&path, SQUARE).unwrap();

        let area = crate::formats::read_study_area(&path).unwrap();
        assert_eq!(area.name, "commune");
        assert_eq!(area.len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = crate::formats::read_study_area(Path::new("zone.shp"));
        assert!(matches!(result, Err(BiodivError::ConfigInvalid { .. })));
    }
}
