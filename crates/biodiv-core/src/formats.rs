//! Readers for study-area files

pub mod geojson;

use crate::error::{BiodivError, Result};
use crate::models::StudyArea;
use std::path::Path;

/// Read a study area, dispatching on the file extension
pub fn read_study_area(path: &Path) -> Result<StudyArea> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "geojson" | "json" => self::geojson::GeoJsonReader.read(path),
        other => Err(BiodivError::ConfigInvalid {
            key: "study_area".to_string(),
            reason: format!(
                "Unsupported study area format '{}' ({}). Use a GeoJSON file",
                other,
                path.display()
            ),
        }),
    }
}
