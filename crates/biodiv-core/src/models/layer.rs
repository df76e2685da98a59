//! Result layers produced by executing an analysis query.

use crate::error::{BiodivError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the final query is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// Live pass-through query, re-evaluated on every read
    #[default]
    Query,
    /// One-shot materialization into a physical table
    Table,
}

/// Lifecycle of a result layer within one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerState {
    Unvalidated,
    Materializing,
    Bound,
    Validated,
    Failed,
}

impl LayerState {
    pub fn can_transition_to(&self, next: LayerState) -> bool {
        use LayerState::*;
        matches!(
            (self, next),
            (Unvalidated, Materializing)
                | (Unvalidated, Bound)
                | (Materializing, Bound)
                | (Bound, Validated)
                | (Unvalidated, Failed)
                | (Materializing, Failed)
                | (Bound, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LayerState::Validated | LayerState::Failed)
    }
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Relation backing a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSource {
    /// Pass-through query text
    Query { sql: String },
    /// Materialized table
    Table { schema: String, table: String },
}

impl LayerSource {
    /// A SELECT statement reading the whole relation
    pub fn select_sql(&self) -> String {
        match self {
            LayerSource::Query { sql } => sql.clone(),
            LayerSource::Table { schema, table } => {
                format!("SELECT * FROM {}.{}", quote_ident(schema), quote_ident(table))
            }
        }
    }
}

impl fmt::Display for LayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSource::Query { .. } => write!(f, "query"),
            LayerSource::Table { schema, table } => write!(f, "{}.{}", schema, table),
        }
    }
}

/// Quote an SQL identifier when it is not a plain lowercase name
pub fn quote_ident(ident: &str) -> String {
    let plain = !ident.is_empty()
        && ident.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !ident.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Column name and database type of a result relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: name.into(), type_name: type_name.into() }
    }

    pub fn is_geometry(&self) -> bool {
        self.type_name.eq_ignore_ascii_case("geometry")
    }
}

/// Rows fetched from a result relation, values in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A query-backed or materialized relation wrapped as a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultLayer {
    pub name: String,
    pub state: LayerState,
    pub source: Option<LayerSource>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    pub row_count: Option<u64>,
    /// Labels of time buckets, aligned with the interval columns
    #[serde(default)]
    pub bucket_labels: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ResultLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LayerState::Unvalidated,
            source: None,
            columns: Vec::new(),
            row_count: None,
            bucket_labels: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Move to the next lifecycle state
    pub fn transition(&mut self, next: LayerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(BiodivError::InvalidStateTransition {
                layer: self.name.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("Layer '{}': {} -> {}", self.name, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn has_geometry(&self) -> bool {
        self.columns.iter().any(ColumnInfo::is_geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lifecycle() {
        let mut layer = ResultLayer::new("obs");
        layer.transition(LayerState::Materializing).unwrap();
        layer.transition(LayerState::Bound).unwrap();
        layer.transition(LayerState::Validated).unwrap();
        assert!(layer.state.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut layer = ResultLayer::new("obs");
        layer.transition(LayerState::Bound).unwrap();
        layer.transition(LayerState::Failed).unwrap();
        assert!(matches!(
            layer.transition(LayerState::Validated),
            Err(BiodivError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_cannot_validate_unbound_layer() {
        let mut layer = ResultLayer::new("obs");
        assert!(layer.transition(LayerState::Validated).is_err());
        assert_eq!(layer.state, LayerState::Unvalidated);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("synthese_2024"), "synthese_2024");
        assert_eq!(quote_ident("2024"), "\"2024\"");
        assert_eq!(quote_ident("My Table"), "\"My Table\"");
    }

    #[test]
    fn test_table_select_sql() {
        let source = LayerSource::Table { schema: "public".into(), table: "extraction".into() };
        assert_eq!(source.select_sql(), "SELECT * FROM public.extraction");
    }
}
