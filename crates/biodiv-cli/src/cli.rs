use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Biodiv - Biodiversity observation analyses on PostGIS
#[derive(Parser, Debug)]
#[command(name = "biodiv")]
#[command(about = "Extract, filter and summarize biodiversity observations", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show planned actions (and the generated SQL) without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new workspace
    Init(InitArgs),

    /// Refresh the cached filter choices from the database
    Refresh(RefreshArgs),

    /// List cached filter choices
    Lookups(LookupsArgs),

    /// Build and run an analysis over a study area
    Run(RunArgs),

    /// List or remove the layers of the project
    Layers(LayersArgs),

    /// Export a project layer as CSV
    Export(ExportArgs),

    /// Show workspace status and configuration
    Status,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Workspace directory path (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Analysis CRS EPSG code (2154 = Lambert 93)
    #[arg(long, default_value = "2154")]
    pub crs: u32,

    /// Schema receiving materialized tables
    #[arg(long, default_value = "public")]
    pub output_schema: String,

    /// Database URL written to the [postgres] section
    #[arg(long)]
    pub database_url: Option<String>,

    /// Force overwrite if workspace already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Only refresh these categories (e.g. groupe_taxo, source_data)
    #[arg(long = "category", value_name = "CATEGORY")]
    pub categories: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct LookupsArgs {
    /// Only list this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Analysis to run: extract_observations, species_summary,
    /// time_interval_summary, area_aggregation or knowledge_state
    pub analysis: String,

    /// Study area polygons (GeoJSON)
    #[arg(long, value_name = "FILE")]
    pub study_area: PathBuf,

    /// Taxonomic filter as RANK=VALUE (e.g. groupe_taxo=Oiseaux), repeatable
    #[arg(long = "taxon", value_name = "RANK=VALUE")]
    pub taxa: Vec<String>,

    /// Period: all, this-year, last-N-years or range (with --from and --to)
    #[arg(long, default_value = "all")]
    pub period: String,

    /// Range start (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<String>,

    /// Range end (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<String>,

    /// Data source prefix, repeatable
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Observation geometry type (point, line, polygon), repeatable
    #[arg(long = "geometry-type", value_name = "TYPE")]
    pub geometry_types: Vec<String>,

    /// Raw SQL condition appended to the filters, unmodified
    #[arg(long = "where", value_name = "SQL")]
    pub extra_where: Option<String>,

    /// Taxonomic rank results are grouped by
    #[arg(long, default_value = "groupe_taxo")]
    pub rank: String,

    /// Reference area type for area aggregation (COM, M1, M5, M10)
    #[arg(long, default_value = "M5")]
    pub areas_type: String,

    /// Time bucket width (year or month)
    #[arg(long, default_value = "year")]
    pub granularity: String,

    /// What is counted per bucket (observations or species)
    #[arg(long, default_value = "observations")]
    pub aggregate: String,

    /// Materialize the result into a table instead of a live query
    #[arg(long)]
    pub materialize: bool,

    /// Name of the resulting layer
    #[arg(long)]
    pub layer_name: Option<String>,

    /// Produce a histogram of the result
    #[arg(long)]
    pub histogram: bool,

    /// Where the histogram (Vega-Lite JSON) is written
    #[arg(long, value_name = "FILE")]
    pub histogram_output: Option<PathBuf>,

    /// Override the analysis CRS EPSG code
    #[arg(long)]
    pub crs: Option<u32>,

    /// Override the schema receiving materialized tables
    #[arg(long)]
    pub output_schema: Option<String>,
}

#[derive(Parser, Debug)]
pub struct LayersArgs {
    /// Remove the named layer from the project
    #[arg(long, value_name = "NAME")]
    pub remove: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Layer name
    pub layer: String,

    /// Destination CSV file
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum number of rows
    #[arg(long)]
    pub limit: Option<usize>,
}
