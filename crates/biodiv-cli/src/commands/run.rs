//! Run command: build an analysis query, bind it as a layer and preview it

use crate::cli::RunArgs;
use crate::config_loader::{find_workspace_root, load_workspace_config_with_overrides, Workspace};
use crate::dry_run::{display_plan, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::RunOutput;
use crate::progress::{create_spinner, finish_error, finish_success};
use crate::storage;
use anyhow::{Context, Result};
use biodiv_core::analysis::{
    build_query, AnalysisKind, AnalysisRequest, AreaType, IntervalOptions, OutputOptions, PreparedQuery,
};
use biodiv_core::config::{CliConfigOverrides, LayeredConfig};
use biodiv_core::export::{cell_text, knowledge_state_bars, time_interval_totals, BarChart};
use biodiv_core::formats::read_study_area;
use biodiv_core::lookup::{LookupCache, LookupCategory};
use biodiv_core::materialize::{materialize_statements, simplify_name, ResultMaterializer};
use biodiv_core::models::{
    FilterSelection, GeometryKind, OutputMode, Period, ResultLayer, ResultSet, TaxonomicRank,
};
use biodiv_core::ports::QueryExecutor;
use biodiv_core::project::Project;
use biodiv_core::query::{Aggregate, Granularity};
use biodiv_core::BiodivError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub async fn execute(args: RunArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    let workspace = find_workspace_root()?;
    let config = load_workspace_config_with_overrides(
        &workspace,
        CliConfigOverrides {
            analysis_crs: args.crs,
            output_schema: args.output_schema.clone(),
            preview_rows: None,
        },
    )?;

    let today = chrono::Local::now().date_naive();
    let request = build_request(&args)?;
    let warnings = lookup_warnings(&workspace, &request.filters)?;
    for warning in &warnings {
        if !output.is_json() {
            output.warning(warning);
        }
    }

    let prepared = build_query(&request, &config, today)?;

    if dry_run {
        let actions = planned_actions(&workspace, &request, &prepared, &config);
        return display_plan(output, &actions, Some(&prepared.sql));
    }

    let store = storage::connect(&workspace).await?;

    let spinner = create_spinner(&format!("Running {}...", request.definition().display_name), output.is_json());
    let layer = match ResultMaterializer::new(&store, config.output_schema.value.clone())
        .materialize(&prepared, request.output.mode)
        .await
    {
        Ok(layer) => {
            finish_success(&spinner, &format!("Layer '{}' ready", layer.name));
            layer
        }
        Err(e) => {
            finish_error(&spinner, "Analysis failed");
            return Err(e.into());
        }
    };

    let mut project = Project::load(workspace.project_path())?;
    project.add(layer.clone())?;
    project.save(workspace.project_path()).context("Failed to update project")?;

    let select = layer
        .source
        .as_ref()
        .map(|source| source.select_sql())
        .unwrap_or_else(|| prepared.sql.clone());
    let preview = store.fetch_rows(&select, Some(config.preview_rows.value)).await?;

    let histogram = match &request.output.histogram_path {
        Some(path) if request.output.histogram => {
            let rows = store.fetch_rows(&select, None).await?;
            histogram_chart(&request, &layer, &rows)?.write(path)?;
            Some(path.display().to_string())
        }
        _ => None,
    };

    if output.is_json() {
        return output.result(RunOutput {
            analysis: request.kind.to_string(),
            preview: preview_records(&layer, &preview),
            layer,
            histogram,
            warnings,
        });
    }

    output.section(&layer.name);
    output.kv("Source", layer.source.as_ref().map(|s| s.to_string()).unwrap_or_default());
    output.kv("Rows", layer.row_count.unwrap_or(0));
    output.kv("Columns", layer.columns.len());

    let (columns, rows) = preview_grid(&layer, &preview);
    if rows.is_empty() {
        output.info("The analysis returned no rows");
    } else {
        output.grid(&columns, rows);
    }

    if let Some(path) = histogram {
        output.success(format!("Histogram written to {}", path));
    }

    Ok(())
}

/// A histogram destination alone is enough to ask for the histogram
fn output_options(args: &RunArgs) -> OutputOptions {
    OutputOptions {
        layer_name: args.layer_name.clone(),
        mode: if args.materialize { OutputMode::Table } else { OutputMode::Query },
        histogram: args.histogram || args.histogram_output.is_some(),
        histogram_path: args.histogram_output.clone(),
    }
}

/// Translate command-line arguments into an analysis request
fn build_request(args: &RunArgs) -> Result<AnalysisRequest> {
    let kind: AnalysisKind = args.analysis.parse()?;

    let output = output_options(args);
    output.check_destinations()?;

    let study_area = read_study_area(&args.study_area)?;

    let mut filters = FilterSelection::new().with_period(parse_period(
        &args.period,
        args.from.as_deref(),
        args.to.as_deref(),
    )?);

    for taxon in &args.taxa {
        let (rank, value) = taxon.split_once('=').ok_or_else(|| BiodivError::ConfigInvalid {
            key: "taxon".to_string(),
            reason: format!("Expected RANK=VALUE, got '{}'", taxon),
        })?;
        filters = filters.with_taxa(rank.trim().parse::<TaxonomicRank>()?, [value.trim()]);
    }

    let geometry_kinds = args
        .geometry_types
        .iter()
        .map(|g| g.parse::<GeometryKind>())
        .collect::<biodiv_core::Result<Vec<_>>>()?;

    filters = filters.with_sources(args.sources.iter().cloned()).with_geometry_kinds(geometry_kinds);
    if let Some(extra) = &args.extra_where {
        filters = filters.with_extra_where(extra.clone());
    }

    let interval = IntervalOptions {
        granularity: args.granularity.parse::<Granularity>()?,
        aggregate: args.aggregate.parse::<Aggregate>()?,
    };

    Ok(AnalysisRequest::new(kind, study_area)
        .with_filters(filters)
        .with_taxonomic_rank(args.rank.parse::<TaxonomicRank>()?)
        .with_areas_type(args.areas_type.parse::<AreaType>()?)
        .with_interval(interval)
        .with_output(output))
}

/// Parse `all`, `this-year`, `last-N-years` or `range` with `--from`/`--to`
pub(crate) fn parse_period(period: &str, from: Option<&str>, to: Option<&str>) -> Result<Period> {
    let invalid = |reason: String| BiodivError::ConfigInvalid { key: "period".to_string(), reason };

    let period = period.trim().to_lowercase();
    match period.as_str() {
        "all" => Ok(Period::All),
        "this-year" => Ok(Period::ThisYear),
        "range" => {
            let (Some(from), Some(to)) = (from, to) else {
                return Err(invalid("a range needs both --from and --to".to_string()).into());
            };
            let parse = |s: &str| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| invalid(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
            };
            Ok(Period::range(parse(from)?, parse(to)?)?)
        }
        other => other
            .strip_prefix("last-")
            .and_then(|rest| rest.strip_suffix("-years").or_else(|| rest.strip_suffix("-year")))
            .and_then(|n| n.parse::<u16>().ok())
            .filter(|n| *n > 0)
            .map(Period::LastYears)
            .ok_or_else(|| {
                invalid(format!("Unknown period '{}'. Use all, this-year, last-N-years or range", other)).into()
            }),
    }
}

/// Selected values the lookup cache does not know about
fn lookup_warnings(workspace: &Workspace, filters: &FilterSelection) -> Result<Vec<String>> {
    let cache = LookupCache::load(workspace.lookups_path())?;
    let mut warnings = Vec::new();

    let selections = filters
        .active_ranks()
        .filter_map(|(rank, values)| LookupCategory::for_rank(*rank).map(|c| (c, values)))
        .chain(std::iter::once((LookupCategory::SourceData, &filters.sources)));

    for (category, values) in selections {
        for value in cache.unknown_values(category, values) {
            tracing::warn!("Value '{}' not in cached {} choices", value, category);
            warnings.push(format!("'{}' is not a known {} value", value, category));
        }
    }

    Ok(warnings)
}

fn planned_actions(
    workspace: &Workspace,
    request: &AnalysisRequest,
    prepared: &PreparedQuery,
    config: &LayeredConfig,
) -> Vec<PlannedAction> {
    let mut actions = Vec::new();

    if request.output.mode == OutputMode::Table {
        let table = simplify_name(&prepared.layer_name);
        let action = materialize_statements(&config.output_schema.value, &table, "<query>")
            .into_iter()
            .fold(
                PlannedAction::new(
                    ActionType::CreateTable,
                    format!("Materialize into {}.{}", config.output_schema.value, table),
                ),
                |action, statement| action.with_detail(statement),
            );
        actions.push(action);
    } else {
        actions.push(PlannedAction::new(
            ActionType::RunQuery,
            format!("Bind '{}' as a query layer", prepared.layer_name),
        ));
    }

    actions.push(PlannedAction::new(
        ActionType::ModifyFile,
        format!("Register layer in {}", workspace.project_path().display()),
    ));

    if let (true, Some(path)) = (request.output.histogram, &request.output.histogram_path) {
        actions.push(PlannedAction::new(
            ActionType::WriteFile,
            format!("Write histogram to {}", path.display()),
        ));
    }

    actions
}

fn histogram_chart(request: &AnalysisRequest, layer: &ResultLayer, rows: &ResultSet) -> Result<BarChart> {
    let chart = match request.kind {
        AnalysisKind::TimeIntervalSummary => {
            let y_label = match request.interval.aggregate {
                Aggregate::Observations => "Observations",
                Aggregate::Species => "Species",
            };
            time_interval_totals(rows, &layer.bucket_labels, y_label)?
        }
        AnalysisKind::KnowledgeState => knowledge_state_bars(rows, request.taxonomic_rank.column())?,
        other => {
            return Err(BiodivError::ConfigInvalid {
                key: "histogram".to_string(),
                reason: format!("{} does not produce a histogram", other),
            }
            .into())
        }
    };
    Ok(chart)
}

/// Indexes of non-geometry columns, in result order
fn visible_columns(layer: &ResultLayer, result: &ResultSet) -> Vec<usize> {
    result
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !layer.columns.iter().any(|c| &c.name == *name && c.is_geometry()))
        .map(|(idx, _)| idx)
        .collect()
}

fn preview_grid(layer: &ResultLayer, result: &ResultSet) -> (Vec<String>, Vec<Vec<String>>) {
    let visible = visible_columns(layer, result);
    let columns = visible.iter().map(|&i| result.columns[i].clone()).collect();
    let rows = result
        .rows
        .iter()
        .map(|row| visible.iter().map(|&i| row.get(i).map(cell_text).unwrap_or_default()).collect())
        .collect();
    (columns, rows)
}

fn preview_records(layer: &ResultLayer, result: &ResultSet) -> Vec<BTreeMap<String, serde_json::Value>> {
    let visible = visible_columns(layer, result);
    result
        .rows
        .iter()
        .map(|row| {
            visible
                .iter()
                .map(|&i| (result.columns[i].clone(), row.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use biodiv_core::models::ColumnInfo;
    use clap::Parser;
    use serde_json::json;
    use std::path::PathBuf;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["biodiv", "run", "knowledge_state", "--study-area", "zone.geojson"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_histogram_output_requests_histogram() {
        let output = output_options(&run_args(&["--histogram-output", "chart.json"]));
        assert!(output.histogram);
        assert_eq!(output.histogram_path, Some(PathBuf::from("chart.json")));
        assert!(output.check_destinations().is_ok());

        let output = output_options(&run_args(&[]));
        assert!(!output.histogram);
        assert!(output.histogram_path.is_none());
    }

    #[test]
    fn test_parse_period_variants() {
        assert_eq!(parse_period("all", None, None).unwrap(), Period::All);
        assert_eq!(parse_period("This-Year", None, None).unwrap(), Period::ThisYear);
        assert_eq!(parse_period("last-5-years", None, None).unwrap(), Period::LastYears(5));
        assert_eq!(parse_period("last-1-year", None, None).unwrap(), Period::LastYears(1));
        assert!(parse_period("last-0-years", None, None).is_err());
        assert!(parse_period("forever", None, None).is_err());
    }

    #[test]
    fn test_parse_range_period() {
        let period = parse_period("range", Some("2020-01-01"), Some("2020-12-31")).unwrap();
        assert_eq!(
            period,
            Period::Range {
                start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            }
        );
        assert!(parse_period("range", Some("2020-01-01"), None).is_err());
        assert!(parse_period("range", Some("2021-01-01"), Some("2020-01-01")).is_err());
        assert!(parse_period("range", Some("01/01/2020"), Some("2020-12-31")).is_err());
    }

    #[test]
    fn test_preview_hides_geometry() {
        let mut layer = ResultLayer::new("obs");
        layer.columns = vec![ColumnInfo::new("id", "int8"), ColumnInfo::new("geom", "geometry")];

        let mut result = ResultSet::new(vec!["id".into(), "geom".into()]);
        result.rows.push(vec![json!(7), json!("0101000020")]);

        let (columns, rows) = preview_grid(&layer, &result);
        assert_eq!(columns, vec!["id".to_string()]);
        assert_eq!(rows, vec![vec!["7".to_string()]]);

        let records = preview_records(&layer, &result);
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0]["id"], json!(7));
    }
}
