//! Error types for biodiv

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BiodivError {
    // Workspace errors
    #[error("Workspace not found at {path}")]
    WorkspaceNotFound { path: PathBuf },

    #[error("Workspace already exists at {path}")]
    WorkspaceExists { path: PathBuf },

    // Study area errors
    #[error("Study area CRS '{crs}' is not an EPSG code (use e.g. EPSG:2154 for Lambert 93)")]
    InvalidCoordinateSystem { crs: String },

    #[error("Study area has no polygon features")]
    EmptyStudyArea,

    #[error("Invalid study area geometry at feature {feature_id}: {reason}")]
    InvalidStudyGeometry { feature_id: String, reason: String },

    // Filter errors
    #[error("Invalid date range: end date {end} precedes start date {start}")]
    InvalidDateRange { start: String, end: String },

    #[error("Analysis '{analysis}' needs a bounded period to build time buckets")]
    UnboundedInterval { analysis: String },

    // Query template errors
    #[error("Template '{template}' has an unresolved placeholder {{{placeholder}}}")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    // Result layer errors
    #[error("Invalid result layer '{layer}': {reason}")]
    InvalidResultLayer { layer: String, reason: String },

    #[error("Layer '{layer}' cannot go from {from} to {to}")]
    InvalidStateTransition {
        layer: String,
        from: String,
        to: String,
    },

    #[error("Layer not found: {name}")]
    LayerNotFound { name: String },

    #[error("No output destination given for {artifact}")]
    MissingOutputDestination { artifact: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BiodivError {
    /// True for errors raised before any database round-trip
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BiodivError::InvalidCoordinateSystem { .. }
                | BiodivError::EmptyStudyArea
                | BiodivError::InvalidStudyGeometry { .. }
                | BiodivError::InvalidDateRange { .. }
                | BiodivError::UnboundedInterval { .. }
                | BiodivError::MissingOutputDestination { .. }
                | BiodivError::ConfigMissing { .. }
                | BiodivError::ConfigInvalid { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BiodivError>;
