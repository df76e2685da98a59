//! Export command: write a project layer to CSV

use crate::cli::ExportArgs;
use crate::config_loader::find_workspace_root;
use crate::dry_run::{display_plan, ActionType, PlannedAction};
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::ExportOutput;
use crate::progress::{create_spinner, finish_error, finish_success};
use crate::storage;
use anyhow::{Context, Result};
use biodiv_core::export::{require_destination, write_csv};
use biodiv_core::ports::QueryExecutor;
use biodiv_core::project::Project;

pub async fn execute(args: ExportArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let path = require_destination("CSV export", args.output.as_deref())?;

    let workspace = find_workspace_root()?;
    let project = Project::load(workspace.project_path())?;
    let layer = project.get(&args.layer).map_err(|_| errors::layer_not_found(&args.layer))?;

    let select = layer
        .source
        .as_ref()
        .map(|source| source.select_sql())
        .ok_or_else(|| errors::layer_not_found(&args.layer).with_context("The layer has no bound source."))?;

    if dry_run {
        let actions = vec![
            PlannedAction::new(ActionType::RunQuery, format!("Read layer '{}'", layer.name))
                .with_detail(match args.limit {
                    Some(limit) => format!("At most {} row(s)", limit),
                    None => "All rows".to_string(),
                }),
            PlannedAction::new(ActionType::WriteFile, format!("Write {}", path.display())),
        ];
        return display_plan(output, &actions, Some(&select));
    }

    let store = storage::connect(&workspace).await?;

    let spinner = create_spinner(&format!("Exporting '{}'...", layer.name), output.is_json());
    let rows = match store.fetch_rows(&select, args.limit).await {
        Ok(result) => write_csv(&result, path).with_context(|| format!("Failed to write {}", path.display())),
        Err(e) => Err(e.into()),
    };
    let rows = match rows {
        Ok(rows) => {
            finish_success(&spinner, &format!("{} row(s) exported", rows));
            rows
        }
        Err(e) => {
            finish_error(&spinner, "Export failed");
            return Err(e);
        }
    };

    if output.is_json() {
        output.result(ExportOutput {
            layer: layer.name.clone(),
            path: path.display().to_string(),
            rows,
        })
    } else {
        output.success(format!("Wrote {} row(s) to {}", rows, path.display()));
        Ok(())
    }
}
