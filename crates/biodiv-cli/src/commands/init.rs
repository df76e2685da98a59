//! Init command implementation

use crate::cli::InitArgs;
use crate::config::{ConfigFile, PostgresSection};
use crate::config_loader::Workspace;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::InitOutput;
use anyhow::{Context, Result};
use biodiv_core::config::validate_schema_name;
use biodiv_core::models::Crs;
use biodiv_core::BiodivError;
use std::fs;

pub fn execute(args: InitArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let output_schema = validate_schema_name(&args.output_schema)?;
    let crs = Crs::from_authid(&format!("EPSG:{}", args.crs))?;

    let workspace = Workspace::new(&args.path);
    if workspace.exists() && !args.force {
        return Err(BiodivError::WorkspaceExists { path: args.path.clone() })
            .context("Use --force to overwrite the configuration");
    }

    let config = ConfigFile {
        analysis_crs: Some(crs.epsg),
        output_schema: Some(output_schema.clone()),
        preview_rows: Some(10),
        postgres: args.database_url.clone().map(|url| PostgresSection {
            database_url: Some(url),
            ..Default::default()
        }),
    };

    if dry_run {
        let actions = vec![
            PlannedAction::new(
                ActionType::CreateDirectory,
                format!("Create .biodiv directory at {}", args.path.display()),
            ),
            PlannedAction::new(ActionType::CreateFile, "Create config.toml")
                .with_detail(format!("Analysis CRS: {}", crs))
                .with_detail(format!("Output schema: {}", output_schema)),
        ];

        return display_planned_actions(output, &actions);
    }

    fs::create_dir_all(workspace.dir()).context("Failed to create .biodiv directory")?;
    fs::write(workspace.config_path(), config.render()).context("Failed to write config.toml")?;

    if output.is_json() {
        output.result(InitOutput {
            workspace_path: args.path.display().to_string(),
            analysis_crs: crs.epsg,
            output_schema,
        })?;
    } else {
        output.success(format!("Initialized biodiv workspace at {}", args.path.display()));

        output.section("Configuration");
        output.kv("Analysis CRS", crs);
        output.kv("Output schema", output_schema);
        if args.database_url.is_none() {
            output.info("No database configured. Set DATABASE_URL or edit .biodiv/config.toml");
        }
        output.info("Next: biodiv refresh");
    }

    Ok(())
}
