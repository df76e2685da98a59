use crate::config::ConfigFile;
use crate::config_loader::Workspace;
use crate::errors;
use anyhow::Result;
use biodiv_store::postgres::{ConfigError, PostgresConfig, PostgresStore};

/// Where the database URL was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    Environment,
    ConfigFile,
}

/// Resolve the database configuration: `DATABASE_URL` first, then the
/// `[postgres]` section of the workspace config
pub fn resolve_postgres_config(workspace: &Workspace) -> Result<(PostgresConfig, UrlSource)> {
    let file = ConfigFile::load_optional(&workspace.config_path())?.unwrap_or_default();

    let (config, source) = match PostgresConfig::from_env() {
        Ok(config) => (config, UrlSource::Environment),
        // Unset or blank: fall back to the config file
        Err(ConfigError::Missing(_)) => (from_config_file(&file)?, UrlSource::ConfigFile),
        Err(ConfigError::Invalid { key, .. }) if key == "DATABASE_URL" => {
            (from_config_file(&file)?, UrlSource::ConfigFile)
        }
        Err(e) => return Err(errors::invalid_config("DATABASE_URL", &e.to_string()).into()),
    };

    Ok((file.apply_postgres_settings(config), source))
}

fn from_config_file(file: &ConfigFile) -> Result<PostgresConfig> {
    let url = file
        .database_url()
        .ok_or_else(|| errors::database_connection_failed("no database URL configured"))?;

    PostgresConfig::new(url.to_string())
        .map_err(|e| errors::invalid_config("database_url", &e.to_string()).into())
}

/// Connect to the observation database
pub async fn connect(workspace: &Workspace) -> Result<PostgresStore> {
    let (config, source) = resolve_postgres_config(workspace)?;
    tracing::debug!("Database URL from {:?}: {}", source, config.redacted_url());

    let store = PostgresStore::new(config.clone()).await.map_err(|e| {
        errors::database_connection_failed(&e.to_string())
            .with_context(format!("Could not reach {}\n\nError: {}", config.redacted_url(), e))
    })?;

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn workspace_with_config(content: Option<&str>) -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        std::fs::create_dir_all(workspace.dir()).unwrap();
        if let Some(content) = content {
            std::fs::write(workspace.config_path(), content).unwrap();
        }
        (dir, workspace)
    }

    const FILE_CONFIG: &str = r#"
[postgres]
database_url = "postgresql://file-host/gn"
statement_timeout = 30
"#;

    #[test]
    #[serial]
    fn test_environment_wins_over_file() {
        let (_dir, workspace) = workspace_with_config(Some(FILE_CONFIG));
        std::env::set_var("DATABASE_URL", "postgresql://env-host/gn");

        let (config, source) = resolve_postgres_config(&workspace).unwrap();
        assert_eq!(source, UrlSource::Environment);
        assert_eq!(config.database_url, "postgresql://env-host/gn");
        assert_eq!(config.statement_timeout, Some(std::time::Duration::from_secs(30)));

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_blank_environment_falls_back_to_file() {
        let (_dir, workspace) = workspace_with_config(Some(FILE_CONFIG));
        std::env::set_var("DATABASE_URL", "  ");

        let (config, source) = resolve_postgres_config(&workspace).unwrap();
        assert_eq!(source, UrlSource::ConfigFile);
        assert_eq!(config.database_url, "postgresql://file-host/gn");

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_invalid_environment_url_is_reported() {
        let (_dir, workspace) = workspace_with_config(Some(FILE_CONFIG));
        std::env::set_var("DATABASE_URL", "mysql://env-host/gn");

        assert!(resolve_postgres_config(&workspace).is_err());

        std::env::remove_var("DATABASE_URL");
    }

    #[test]
    #[serial]
    fn test_no_url_anywhere() {
        std::env::remove_var("DATABASE_URL");
        let (_dir, workspace) = workspace_with_config(None);

        let error = resolve_postgres_config(&workspace).unwrap_err();
        assert!(error.downcast_ref::<errors::CliError>().is_some());
    }
}
