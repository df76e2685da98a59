//! Lookups command: list cached filter choices

use crate::cli::LookupsArgs;
use crate::config_loader::find_workspace_root;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::LookupRow;
use anyhow::Result;
use biodiv_core::lookup::{LookupCache, LookupCategory};

const PREVIEW_VALUES: usize = 5;

pub fn execute(args: LookupsArgs, output: &OutputWriter) -> Result<()> {
    let workspace = find_workspace_root()?;
    let cache = LookupCache::load(workspace.lookups_path())?;

    if cache.is_empty() {
        return Err(errors::lookups_empty().into());
    }

    if let Some(category) = args.category {
        let category: LookupCategory = category.parse()?;
        let values = cache.get(category);

        if output.is_json() {
            return output.result(serde_json::json!({
                "category": category.key(),
                "values": values,
            }));
        }

        output.section(category.key());
        for value in values {
            println!("{}", value);
        }
        return Ok(());
    }

    let rows: Vec<LookupRow> = LookupCategory::ALL
        .into_iter()
        .map(|category| {
            let values = cache.get(category);
            let mut preview = values.iter().take(PREVIEW_VALUES).cloned().collect::<Vec<_>>().join(", ");
            if values.len() > PREVIEW_VALUES {
                preview.push_str(", ...");
            }
            LookupRow { category: category.key().to_string(), count: values.len(), preview }
        })
        .collect();

    output.table(rows)?;
    if let Some(at) = cache.refreshed_at() {
        if !output.is_json() {
            output.info(format!("Refreshed {}", at.format("%Y-%m-%d %H:%M UTC")));
        }
    }
    Ok(())
}
