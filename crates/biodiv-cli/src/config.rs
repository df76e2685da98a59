use anyhow::{Context, Result};
use biodiv_store::postgres::{PoolConfig, PostgresConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete configuration file structure (`.biodiv/config.toml`)
///
/// The top-level analysis keys are also read by the layered configuration;
/// this type adds the database section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub analysis_crs: Option<u32>,
    pub output_schema: Option<String>,
    pub preview_rows: Option<usize>,

    #[serde(default)]
    pub postgres: Option<PostgresSection>,
}

/// `[postgres]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostgresSection {
    pub database_url: Option<String>,

    /// Per-statement timeout in seconds
    pub statement_timeout: Option<u64>,

    #[serde(default)]
    pub pool: Option<PoolSection>,
}

/// `[postgres.pool]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout: u64,

    /// Seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

fn default_min_connections() -> u32 {
    0
}

fn default_max_connections() -> u32 {
    4
}

fn default_acquire_timeout() -> u64 {
    15
}

fn default_idle_timeout() -> u64 {
    300
}

impl ConfigFile {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load the file if it exists
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Render with explanatory comments, as written by `biodiv init`
    pub fn render(&self) -> String {
        let mut content = format!(
            r#"# Biodiv workspace configuration

# SRID the observations are stored in; study areas are reprojected to it
# 2154 = RGF93 / Lambert 93
analysis_crs = {}

# Schema receiving materialized tables (run --materialize)
output_schema = "{}"

# Rows shown after a run
preview_rows = {}
"#,
            self.analysis_crs.unwrap_or(biodiv_core::schema::DEFAULT_ANALYSIS_SRID),
            self.output_schema.as_deref().unwrap_or("public"),
            self.preview_rows.unwrap_or(10),
        );

        match self.postgres.as_ref().and_then(|p| p.database_url.as_deref()) {
            Some(url) => content.push_str(&format!("\n[postgres]\ndatabase_url = \"{}\"\n", url)),
            None => content.push_str(
                "\n# DATABASE_URL takes precedence over this section\n# [postgres]\n# database_url = \"postgresql://user@localhost/geonature\"\n",
            ),
        }
        content
    }

    /// Database URL from the file, if any
    pub fn database_url(&self) -> Option<&str> {
        self.postgres.as_ref()?.database_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Apply the `[postgres]` pool and timeout settings to `config`
    pub fn apply_postgres_settings(&self, mut config: PostgresConfig) -> PostgresConfig {
        let Some(section) = &self.postgres else {
            return config;
        };

        if let Some(pool) = &section.pool {
            config.pool = PoolConfig {
                min_connections: pool.min_connections,
                max_connections: pool.max_connections,
                acquire_timeout: Duration::from_secs(pool.acquire_timeout),
                idle_timeout: Duration::from_secs(pool.idle_timeout),
            };
        }

        if let Some(secs) = section.statement_timeout {
            config = config.with_statement_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_file_parses_back() {
        let config = ConfigFile {
            analysis_crs: Some(2154),
            output_schema: Some("analyses".to_string()),
            preview_rows: None,
            postgres: Some(PostgresSection {
                database_url: Some("postgresql://lpo@localhost/gn".to_string()),
                ..Default::default()
            }),
        };

        let parsed: ConfigFile = toml::from_str(&config.render()).unwrap();
        assert_eq!(parsed.analysis_crs, Some(2154));
        assert_eq!(parsed.output_schema.as_deref(), Some("analyses"));
        assert_eq!(parsed.preview_rows, Some(10));
        assert_eq!(parsed.database_url(), Some("postgresql://lpo@localhost/gn"));
    }

    #[test]
    fn test_pool_section_applied() {
        let content = r#"
[postgres]
database_url = "postgresql://localhost/gn"
statement_timeout = 120

[postgres.pool]
max_connections = 8
"#;
        let file: ConfigFile = toml::from_str(content).unwrap();
        let config = file.apply_postgres_settings(
            PostgresConfig::new("postgresql://localhost/gn".to_string()).unwrap(),
        );

        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.pool.min_connections, 0);
        assert_eq!(config.statement_timeout, Some(Duration::from_secs(120)));
    }
}
