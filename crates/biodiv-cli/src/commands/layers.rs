use crate::cli::LayersArgs;
use crate::config_loader::find_workspace_root;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::LayerRow;
use anyhow::Result;
use biodiv_core::project::Project;

pub fn execute(args: LayersArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let workspace = find_workspace_root()?;
    let mut project = Project::load(workspace.project_path())?;

    let Some(name) = args.remove else {
        if project.is_empty() && !output.is_json() {
            output.info("No layers yet. Create one with: biodiv run <analysis> <study-area>");
            return Ok(());
        }
        let rows: Vec<LayerRow> = project.layers().iter().map(LayerRow::from).collect();
        return output.table(rows);
    };

    // Only the registry entry goes away; a materialized table stays in the database
    if dry_run {
        project.get(&name).map_err(|_| errors::layer_not_found(&name))?;
        let actions = vec![PlannedAction::new(
            ActionType::ModifyFile,
            format!("Remove layer '{}' from {}", name, workspace.project_path().display()),
        )];
        return display_planned_actions(output, &actions);
    }

    let removed = project.remove(&name).map_err(|_| errors::layer_not_found(&name))?;
    project.save(workspace.project_path())?;

    if output.is_json() {
        output.result(LayerRow::from(&removed))
    } else {
        output.success(format!("Removed layer '{}'", removed.name));
        Ok(())
    }
}
