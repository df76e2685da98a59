use biodiv_core::models::ResultLayer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// Output for init command
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub workspace_path: String,
    pub analysis_crs: u32,
    pub output_schema: String,
}

/// Output for refresh command
#[derive(Debug, Serialize)]
pub struct RefreshOutput {
    pub refreshed_at: DateTime<Utc>,
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

/// One cached category
#[derive(Debug, Serialize, Tabled)]
pub struct LookupRow {
    pub category: String,
    pub count: usize,
    #[tabled(rename = "values")]
    pub preview: String,
}

/// Output for run command
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub analysis: String,
    pub layer: ResultLayer,
    pub preview: Vec<BTreeMap<String, serde_json::Value>>,
    pub histogram: Option<String>,
    pub warnings: Vec<String>,
}

/// One project layer
#[derive(Debug, Serialize, Tabled)]
pub struct LayerRow {
    pub name: String,
    pub source: String,
    pub rows: String,
    pub columns: usize,
    pub geometry: bool,
    pub created: String,
}

impl From<&ResultLayer> for LayerRow {
    fn from(layer: &ResultLayer) -> Self {
        Self {
            name: layer.name.clone(),
            source: layer.source.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
            rows: layer.row_count.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
            columns: layer.columns.len(),
            geometry: layer.has_geometry(),
            created: layer.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Output for export command
#[derive(Debug, Serialize)]
pub struct ExportOutput {
    pub layer: String,
    pub path: String,
    pub rows: usize,
}

/// One configuration value with its provenance
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    pub key: String,
    pub value: String,
    pub source: String,
}

/// Output for status command
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub workspace_path: String,
    pub config: Vec<ConfigRow>,
    pub database: Option<String>,
    /// PostGIS version when the database answered
    pub postgis: Option<String>,
    pub lookups_refreshed_at: Option<DateTime<Utc>>,
    pub lookup_categories: usize,
    pub layers: usize,
}
