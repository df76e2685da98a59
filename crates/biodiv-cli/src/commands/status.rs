use crate::config_loader::{find_workspace_root, load_workspace_config, Workspace};
use crate::output::OutputWriter;
use crate::output_types::{ConfigRow, StatusOutput};
use crate::storage::{self, UrlSource};
use anyhow::Result;
use biodiv_core::lookup::LookupCache;
use biodiv_core::project::Project;
use std::time::Duration;

const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn execute(output: &OutputWriter) -> Result<()> {
    let workspace = find_workspace_root()?;
    let config = load_workspace_config(&workspace)?;

    let mut rows: Vec<ConfigRow> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    let database = storage::resolve_postgres_config(&workspace).ok().map(|(config, source)| {
        let origin = match source {
            UrlSource::Environment => "DATABASE_URL",
            UrlSource::ConfigFile => "config file",
        };
        format!("{} ({})", config.redacted_url(), origin)
    });
    let postgis = match &database {
        Some(_) => Some(postgis_status(&workspace).await),
        None => None,
    };

    let cache = LookupCache::load(workspace.lookups_path())?;
    let project = Project::load(workspace.project_path())?;

    let status = StatusOutput {
        workspace_path: workspace.root.display().to_string(),
        config: rows,
        database,
        postgis,
        lookups_refreshed_at: cache.refreshed_at(),
        lookup_categories: cache.categories().len(),
        layers: project.len(),
    };

    if output.is_json() {
        return output.result(status);
    }

    output.section("Workspace");
    output.kv("Path", &status.workspace_path);
    output.kv("Database", status.database.as_deref().unwrap_or("not configured"));
    if let Some(postgis) = &status.postgis {
        output.kv("PostGIS", postgis);
    }

    output.section("Configuration");
    output.table(status.config)?;

    output.section("Lookups");
    match status.lookups_refreshed_at {
        Some(at) => {
            output.kv("Refreshed", at.format("%Y-%m-%d %H:%M UTC"));
            output.kv("Categories", status.lookup_categories);
        }
        None => output.warning("Never refreshed. Run: biodiv refresh"),
    }

    output.section("Project");
    output.kv("Layers", status.layers);
    Ok(())
}

/// PostGIS version, or why the database could not be reached
async fn postgis_status(workspace: &Workspace) -> String {
    let check = async {
        let store = storage::connect(workspace).await?;
        Ok::<_, anyhow::Error>(store.postgis_version().await?)
    };

    match tokio::time::timeout(DATABASE_CHECK_TIMEOUT, check).await {
        Ok(Ok(version)) => version,
        Ok(Err(e)) => {
            tracing::debug!("Database check failed: {:#}", e);
            "unreachable".to_string()
        }
        Err(_) => "unreachable (timed out)".to_string(),
    }
}
