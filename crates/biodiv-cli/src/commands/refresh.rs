//! Refresh command: mirror database enumerations into the lookup cache

use crate::cli::RefreshArgs;
use crate::config_loader::find_workspace_root;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::RefreshOutput;
use crate::progress::{create_progress_bar, finish_error, finish_success};
use crate::storage;
use anyhow::{Context, Result};
use biodiv_core::lookup::{LookupCache, LookupCategory, LookupRefresher};
use chrono::Utc;

pub async fn execute(args: RefreshArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let workspace = find_workspace_root()?;

    let categories = if args.categories.is_empty() {
        LookupCategory::ALL.to_vec()
    } else {
        args.categories
            .iter()
            .map(|c| c.parse::<LookupCategory>())
            .collect::<biodiv_core::Result<Vec<_>>>()?
    };

    if dry_run {
        let actions: Vec<PlannedAction> = categories
            .iter()
            .map(|category| {
                PlannedAction::new(ActionType::RunQuery, format!("Fetch {} values", category))
                    .with_detail(category.distinct_values_sql())
            })
            .chain(std::iter::once(PlannedAction::new(
                ActionType::WriteFile,
                format!("Write {}", workspace.lookups_path().display()),
            )))
            .collect();
        return display_planned_actions(output, &actions);
    }

    let store = storage::connect(&workspace).await?;
    let mut cache = LookupCache::load(workspace.lookups_path())?;

    let pb = create_progress_bar(categories.len() as u64, "Refreshing filter choices", output.is_json());
    let result = LookupRefresher::new(&store)
        .only(categories)
        .refresh(&mut cache, |category, count| {
            pb.set_message(format!("{}: {} value(s)", category, count));
            pb.inc(1);
        })
        .await;

    let summary = match result {
        Ok(summary) => {
            finish_success(&pb, "Filter choices refreshed");
            summary
        }
        Err(e) => {
            finish_error(&pb, "Refresh failed, cache left unchanged");
            return Err(e.into());
        }
    };

    cache
        .save(workspace.lookups_path())
        .context("Failed to write lookup cache")?;

    if output.is_json() {
        output.result(RefreshOutput {
            refreshed_at: cache.refreshed_at().unwrap_or_else(Utc::now),
            counts: summary.counts.iter().map(|(c, n)| (c.to_string(), *n)).collect(),
            total: summary.total(),
        })?;
    } else {
        output.section("Lookup cache");
        for (category, count) in &summary.counts {
            output.kv(category, count);
        }
        output.success(format!("{} value(s) cached", summary.total()));
    }

    Ok(())
}
