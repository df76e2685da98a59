use crate::error::{BiodivError, Result};
use crate::schema::DEFAULT_ANALYSIS_SRID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered analysis configuration
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// SRID observations are stored in; study areas are reprojected to it
    pub analysis_crs: ConfigValue<u32>,
    /// Schema receiving materialized tables
    pub output_schema: ConfigValue<String>,
    /// Rows shown when previewing a result
    pub preview_rows: ConfigValue<usize>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            analysis_crs: ConfigValue::new(DEFAULT_ANALYSIS_SRID, ConfigSource::Default),
            output_schema: ConfigValue::new("public".to_string(), ConfigSource::Default),
            preview_rows: ConfigValue::new(10, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Unknown tables (such as `[postgres]`) are ignored here.
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| BiodivError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| BiodivError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(crs) = file_config.analysis_crs {
            self.analysis_crs.update(crs, ConfigSource::File);
        }

        if let Some(schema) = file_config.output_schema {
            self.output_schema.update(validate_schema_name(&schema)?, ConfigSource::File);
        }

        if let Some(rows) = file_config.preview_rows {
            self.preview_rows.update(rows, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // BIODIV_CRS
        if let Ok(crs_str) = env::var("BIODIV_CRS") {
            match parse_epsg_code(&crs_str) {
                Ok(crs) => self.analysis_crs.update(crs, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid BIODIV_CRS value '{}': expected an EPSG code such as 2154",
                    crs_str
                ),
            }
        }

        // BIODIV_OUTPUT_SCHEMA
        if let Ok(schema) = env::var("BIODIV_OUTPUT_SCHEMA") {
            match validate_schema_name(&schema) {
                Ok(schema) => self.output_schema.update(schema, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid BIODIV_OUTPUT_SCHEMA value '{}': expected a lowercase identifier",
                    schema
                ),
            }
        }

        // BIODIV_PREVIEW_ROWS
        if let Ok(rows_str) = env::var("BIODIV_PREVIEW_ROWS") {
            match rows_str.parse::<usize>() {
                Ok(rows) => self.preview_rows.update(rows, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid BIODIV_PREVIEW_ROWS value '{}': expected a positive integer",
                    rows_str
                ),
            }
        }

        self
    }

    /// Update configuration from CLI arguments
    ///
    /// Fails without touching any value when the schema override is not a plain identifier.
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) -> Result<()> {
        let schema = overrides.output_schema.as_deref().map(validate_schema_name).transpose()?;

        if let Some(crs) = overrides.analysis_crs {
            self.analysis_crs.update(crs, ConfigSource::Cli);
        }

        if let Some(schema) = schema {
            self.output_schema.update(schema, ConfigSource::Cli);
        }

        if let Some(rows) = overrides.preview_rows {
            self.preview_rows.update(rows, ConfigSource::Cli);
        }

        Ok(())
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "analysis_crs".to_string(),
            (format!("EPSG:{}", self.analysis_crs.value), self.analysis_crs.source),
        );

        map.insert(
            "output_schema".to_string(),
            (self.output_schema.value.clone(), self.output_schema.source),
        );

        map.insert(
            "preview_rows".to_string(),
            (self.preview_rows.value.to_string(), self.preview_rows.source),
        );

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    analysis_crs: Option<u32>,
    output_schema: Option<String>,
    preview_rows: Option<usize>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub analysis_crs: Option<u32>,
    pub output_schema: Option<String>,
    pub preview_rows: Option<usize>,
}

/// Parse an EPSG code, with or without the `EPSG:` prefix
pub fn parse_epsg_code(s: &str) -> Result<u32> {
    let code = s.trim();
    let code = code
        .strip_prefix("EPSG:")
        .or_else(|| code.strip_prefix("epsg:"))
        .unwrap_or(code);

    code.parse::<u32>().ok().filter(|c| *c > 0).ok_or_else(|| BiodivError::ConfigInvalid {
        key: "analysis_crs".to_string(),
        reason: format!("Invalid EPSG code: {}", s),
    })
}

/// Accept only plain lowercase identifiers for the output schema
pub fn validate_schema_name(s: &str) -> Result<String> {
    let valid = !s.is_empty()
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit());

    if valid {
        Ok(s.to_string())
    } else {
        Err(BiodivError::ConfigInvalid {
            key: "output_schema".to_string(),
            reason: format!("Invalid schema name: {}. Use lowercase letters, digits and _", s),
        })
    }
}
