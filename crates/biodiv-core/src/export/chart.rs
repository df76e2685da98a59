//! Bar charts rendered as Vega-Lite v5 specifications.
//!
//! The document embeds its data inline, so any Vega-Lite renderer (vega-cli,
//! vega-embed, a notebook) turns it into an image without a database.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::{BiodivError, Result};
use crate::export::{cell_number, cell_text};
use crate::models::ResultSet;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// A labelled bar chart
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Bars in display order
    pub bars: Vec<(String, f64)>,
}

impl BarChart {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self { title: title.into(), x_label: x_label.into(), y_label: y_label.into(), bars: Vec::new() }
    }

    pub fn with_bar(mut self, label: impl Into<String>, value: f64) -> Self {
        self.bars.push((label.into(), value));
        self
    }

    pub fn to_vega_lite(&self) -> Value {
        let values: Vec<Value> = self
            .bars
            .iter()
            .map(|(label, value)| json!({ "label": label, "value": value }))
            .collect();
        // Keep the bar order instead of Vega's alphabetical default
        let order: Vec<&str> = self.bars.iter().map(|(label, _)| label.as_str()).collect();

        json!({
            "$schema": VEGA_LITE_SCHEMA,
            "title": self.title,
            "width": "container",
            "data": { "values": values },
            "mark": { "type": "bar", "tooltip": true },
            "encoding": {
                "x": {
                    "field": "label",
                    "type": "nominal",
                    "title": self.x_label,
                    "sort": order,
                    "axis": { "labelAngle": -45 }
                },
                "y": {
                    "field": "value",
                    "type": "quantitative",
                    "title": self.y_label
                }
            }
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_vega_lite())
            .map_err(|e| BiodivError::Serialization(format!("Failed to serialize chart: {}", e)))?;
        fs::write(path, content)?;
        tracing::info!("Histogram written to {}", path.display());
        Ok(())
    }
}

/// Per-bucket totals of a time-interval summary, one bar per label
pub fn time_interval_totals(result: &ResultSet, labels: &[String], y_label: &str) -> Result<BarChart> {
    let mut chart = BarChart::new("Observations per time interval", "Period", y_label);

    for label in labels {
        let index = result.column_index(label).ok_or_else(|| BiodivError::InvalidResultLayer {
            layer: "time_interval_summary".to_string(),
            reason: format!("missing interval column \"{}\"", label),
        })?;
        let total: f64 = result.rows.iter().filter_map(|row| row.get(index).and_then(cell_number)).sum();
        chart.bars.push((label.clone(), total));
    }

    Ok(chart)
}

/// Species count per group of a knowledge-state summary
pub fn knowledge_state_bars(result: &ResultSet, rank_column: &str) -> Result<BarChart> {
    let missing = |column: &str| BiodivError::InvalidResultLayer {
        layer: "knowledge_state".to_string(),
        reason: format!("missing column \"{}\"", column),
    };
    let label_index = result.column_index(rank_column).ok_or_else(|| missing(rank_column))?;
    let count_index = result.column_index("nb_especes").ok_or_else(|| missing("nb_especes"))?;

    let mut chart = BarChart::new("State of knowledge", rank_column, "Species");
    for row in &result.rows {
        let label = row.get(label_index).map(cell_text).unwrap_or_default();
        let label = if label.is_empty() { "Unknown".to_string() } else { label };
        let value = row.get(count_index).and_then(cell_number).unwrap_or(0.0);
        chart.bars.push((label, value));
    }

    Ok(chart)
}
