//! Analysis definitions and request assembly.
//!
//! Every analysis type is a data value ([`AnalysisDefinition`]) rather than
//! its own code path: a template plus flags saying which extra inputs it
//! needs. [`build_query`] turns any request into executable SQL.

use crate::config::LayeredConfig;
use crate::error::{BiodivError, Result};
use crate::models::{Crs, FilterSelection, OutputMode, StudyArea, TaxonomicRank};
use crate::query::intervals::{interval_columns, Aggregate, Granularity};
use crate::query::templates::{
    self, QueryTemplate, TemplateBindings, ARRAY_POLYGONS, AREAS_TYPE, INTERVAL_COLUMNS,
    TAXONOMIC_RANK_DB, TAXONOMIC_RANK_LABEL,
};
use crate::query::{FilterBuilder, SpatialPredicateBuilder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    ExtractObservations,
    SpeciesSummary,
    TimeIntervalSummary,
    AreaAggregation,
    KnowledgeState,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::ExtractObservations,
        AnalysisKind::SpeciesSummary,
        AnalysisKind::TimeIntervalSummary,
        AnalysisKind::AreaAggregation,
        AnalysisKind::KnowledgeState,
    ];

    pub fn definition(&self) -> &'static AnalysisDefinition {
        match self {
            AnalysisKind::ExtractObservations => &ANALYSES[0],
            AnalysisKind::SpeciesSummary => &ANALYSES[1],
            AnalysisKind::TimeIntervalSummary => &ANALYSES[2],
            AnalysisKind::AreaAggregation => &ANALYSES[3],
            AnalysisKind::KnowledgeState => &ANALYSES[4],
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

impl FromStr for AnalysisKind {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase().replace('-', "_");
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.definition().name == wanted)
            .ok_or_else(|| BiodivError::ConfigInvalid {
                key: "analysis".to_string(),
                reason: format!("Unknown analysis: {}", s),
            })
    }
}

/// Reference area types for per-area aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AreaType {
    /// Communes
    Commune,
    /// 1 km grid
    Grid1,
    /// 5 km grid
    #[default]
    Grid5,
    /// 10 km grid
    Grid10,
}

impl AreaType {
    /// `type_code` in the area type catalogue
    pub fn code(&self) -> &'static str {
        match self {
            AreaType::Commune => "COM",
            AreaType::Grid1 => "M1",
            AreaType::Grid5 => "M5",
            AreaType::Grid10 => "M10",
        }
    }
}

impl FromStr for AreaType {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "COM" | "COMMUNE" | "COMMUNES" => Ok(AreaType::Commune),
            "M1" => Ok(AreaType::Grid1),
            "M5" => Ok(AreaType::Grid5),
            "M10" => Ok(AreaType::Grid10),
            _ => Err(BiodivError::ConfigInvalid {
                key: "areas_type".to_string(),
                reason: format!("Unknown area type: {}. Use COM, M1, M5 or M10", s),
            }),
        }
    }
}

/// What the result looks like once loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Has a geometry column, displayed on a map
    MapLayer,
    /// Attribute table only
    Table,
}

/// Static description of one analysis type
#[derive(Debug)]
pub struct AnalysisDefinition {
    pub kind: AnalysisKind,
    pub name: &'static str,
    pub display_name: &'static str,
    pub template: QueryTemplate,
    pub needs_taxonomic_rank: bool,
    pub needs_areas_type: bool,
    pub needs_time_interval: bool,
    pub supports_histogram: bool,
    pub output: OutputKind,
    pub default_layer_name: &'static str,
}

pub static ANALYSES: [AnalysisDefinition; 5] = [
    AnalysisDefinition {
        kind: AnalysisKind::ExtractObservations,
        name: "extract_observations",
        display_name: "Extract observations",
        template: templates::EXTRACT_OBSERVATIONS,
        needs_taxonomic_rank: false,
        needs_areas_type: false,
        needs_time_interval: false,
        supports_histogram: false,
        output: OutputKind::MapLayer,
        default_layer_name: "Observations",
    },
    AnalysisDefinition {
        kind: AnalysisKind::SpeciesSummary,
        name: "species_summary",
        display_name: "Summary table per species",
        template: templates::SPECIES_SUMMARY,
        needs_taxonomic_rank: false,
        needs_areas_type: false,
        needs_time_interval: false,
        supports_histogram: false,
        output: OutputKind::Table,
        default_layer_name: "Species summary",
    },
    AnalysisDefinition {
        kind: AnalysisKind::TimeIntervalSummary,
        name: "time_interval_summary",
        display_name: "Summary table per time interval",
        template: templates::TIME_INTERVAL_SUMMARY,
        needs_taxonomic_rank: true,
        needs_areas_type: false,
        needs_time_interval: true,
        supports_histogram: true,
        output: OutputKind::Table,
        default_layer_name: "Time interval summary",
    },
    AnalysisDefinition {
        kind: AnalysisKind::AreaAggregation,
        name: "area_aggregation",
        display_name: "Observations per area",
        template: templates::AREA_AGGREGATION,
        needs_taxonomic_rank: false,
        needs_areas_type: true,
        needs_time_interval: false,
        supports_histogram: false,
        output: OutputKind::MapLayer,
        default_layer_name: "Observations per area",
    },
    AnalysisDefinition {
        kind: AnalysisKind::KnowledgeState,
        name: "knowledge_state",
        display_name: "State of knowledge",
        template: templates::KNOWLEDGE_STATE,
        needs_taxonomic_rank: true,
        needs_areas_type: false,
        needs_time_interval: false,
        supports_histogram: true,
        output: OutputKind::Table,
        default_layer_name: "State of knowledge",
    },
];

/// Time bucketing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalOptions {
    pub granularity: Granularity,
    pub aggregate: Aggregate,
}

/// Where the results go
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputOptions {
    pub layer_name: Option<String>,
    pub mode: OutputMode,
    pub histogram: bool,
    pub histogram_path: Option<PathBuf>,
}

impl OutputOptions {
    pub fn check_destinations(&self) -> Result<()> {
        if self.histogram && self.histogram_path.is_none() {
            return Err(BiodivError::MissingOutputDestination {
                artifact: "histogram".to_string(),
            });
        }
        Ok(())
    }
}

/// One fully specified analysis request
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: AnalysisKind,
    pub study_area: StudyArea,
    pub filters: FilterSelection,
    pub taxonomic_rank: TaxonomicRank,
    pub areas_type: AreaType,
    pub interval: IntervalOptions,
    pub output: OutputOptions,
}

impl AnalysisRequest {
    pub fn new(kind: AnalysisKind, study_area: StudyArea) -> Self {
        Self {
            kind,
            study_area,
            filters: FilterSelection::default(),
            taxonomic_rank: TaxonomicRank::GroupeTaxo,
            areas_type: AreaType::default(),
            interval: IntervalOptions::default(),
            output: OutputOptions::default(),
        }
    }

    pub fn with_filters(mut self, filters: FilterSelection) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_taxonomic_rank(mut self, rank: TaxonomicRank) -> Self {
        self.taxonomic_rank = rank;
        self
    }

    pub fn with_areas_type(mut self, areas_type: AreaType) -> Self {
        self.areas_type = areas_type;
        self
    }

    pub fn with_interval(mut self, interval: IntervalOptions) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_output(mut self, output: OutputOptions) -> Self {
        self.output = output;
        self
    }

    pub fn definition(&self) -> &'static AnalysisDefinition {
        self.kind.definition()
    }

    pub fn layer_name(&self) -> String {
        self.output
            .layer_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.definition().default_layer_name.to_string())
    }

    /// Checks that need no SQL: output destinations, then option sanity
    pub fn validate(&self) -> Result<()> {
        self.output.check_destinations()?;

        let definition = self.definition();
        if self.output.histogram && !definition.supports_histogram {
            return Err(BiodivError::ConfigInvalid {
                key: "histogram".to_string(),
                reason: format!("{} does not produce a histogram", definition.display_name),
            });
        }
        if definition.kind == AnalysisKind::KnowledgeState
            && self.taxonomic_rank == TaxonomicRank::Species
        {
            return Err(BiodivError::ConfigInvalid {
                key: "taxonomic_rank".to_string(),
                reason: "state of knowledge counts species, pick a higher rank".to_string(),
            });
        }

        self.filters.validate()
    }
}

/// Output of the query builder, ready for the materializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    pub kind: AnalysisKind,
    pub layer_name: String,
    pub sql: String,
    pub spatial_predicate: String,
    pub filters: String,
    pub bucket_labels: Vec<String>,
}

/// Build the final SQL for a request.
///
/// Fails fast, before any SQL is produced, on missing output destinations,
/// a non-EPSG study area, an empty study area or a reversed date range.
pub fn build_query(
    request: &AnalysisRequest,
    config: &LayeredConfig,
    today: NaiveDate,
) -> Result<PreparedQuery> {
    request.validate()?;

    let definition = request.definition();
    let spatial_predicate =
        SpatialPredicateBuilder::new(Crs::new(config.analysis_crs.value)).build(&request.study_area)?;
    let filters = FilterBuilder::new(today).build(&request.filters)?;

    let mut bindings = TemplateBindings::new()
        .bind(ARRAY_POLYGONS, spatial_predicate.clone())
        .bind_filters(&filters);

    if definition.needs_taxonomic_rank {
        bindings = bindings
            .bind(TAXONOMIC_RANK_DB, request.taxonomic_rank.qualified_column())
            .bind(TAXONOMIC_RANK_LABEL, request.taxonomic_rank.column());
    }

    if definition.needs_areas_type {
        bindings = bindings.bind(AREAS_TYPE, request.areas_type.code());
    }

    let mut bucket_labels = Vec::new();
    if definition.needs_time_interval {
        let columns = interval_columns(
            definition.name,
            &request.filters.period,
            request.interval.granularity,
            request.interval.aggregate,
            today,
        )?;
        bindings = bindings.bind(INTERVAL_COLUMNS, columns.sql);
        bucket_labels = columns.labels;
    }

    let sql = definition.template.fill(&bindings)?;
    tracing::debug!("{} SQL:\n{}", definition.name, sql);

    Ok(PreparedQuery {
        kind: definition.kind,
        layer_name: request.layer_name(),
        sql,
        spatial_predicate,
        filters,
        bucket_labels,
    })
}
