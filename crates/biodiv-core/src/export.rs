//! Export and visualization helpers operating on fetched result sets.

pub mod chart;
pub mod csv;

pub use chart::{knowledge_state_bars, time_interval_totals, BarChart};
pub use self::csv::{write_csv, write_csv_to};

use crate::error::{BiodivError, Result};
use std::path::Path;

/// Destination of an export, required before any work is done
pub fn require_destination<'a>(artifact: &str, path: Option<&'a Path>) -> Result<&'a Path> {
    path.ok_or_else(|| BiodivError::MissingOutputDestination { artifact: artifact.to_string() })
}

/// Numeric value of a JSON cell; counts may come back as numbers or text
pub(crate) fn cell_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text of a JSON cell as written to an export
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
