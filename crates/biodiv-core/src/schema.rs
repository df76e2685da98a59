//! Relation and column names of the observation database.
//!
//! Query templates interpolate these names directly into SQL text, so they
//! must match the deployed schema exactly.

// Relation names are macros so query templates can splice them with `concat!`
macro_rules! observations {
    () => {
        "src_lpodatas.v_c_observations"
    };
}
macro_rules! taxref {
    () => {
        "taxonomie.taxref"
    };
}
macro_rules! areas {
    () => {
        "ref_geo.l_areas"
    };
}
macro_rules! area_types {
    () => {
        "ref_geo.bib_areas_types"
    };
}
macro_rules! area_links {
    () => {
        "gn_synthese.cor_area_synthese"
    };
}
pub(crate) use area_links;
pub(crate) use area_types;
pub(crate) use areas;
pub(crate) use observations;
pub(crate) use taxref;

/// Observation view, aliased `obs` in every template
pub const OBSERVATIONS: &str = observations!();

/// Taxonomic reference, aliased `t`
pub const TAXREF: &str = taxref!();

/// Reference areas (communes, grid cells), aliased `la`
pub const AREAS: &str = areas!();

/// Area type catalogue, aliased `bat`
pub const AREA_TYPES: &str = area_types!();

/// Observation to area link table, aliased `cor`
pub const AREA_LINKS: &str = area_links!();

pub const COL_YEAR: &str = "date_an";
pub const COL_DATE: &str = "date";
pub const COL_SOURCE: &str = "source";
pub const COL_GEOMETRY_TYPE: &str = "type_geom";

/// Primary key column every result relation carries
pub const COL_ID: &str = "id";

/// Lambert 93, the SRID observations are stored in
pub const DEFAULT_ANALYSIS_SRID: u32 = 2154;

/// Label of the trailing total column in time-interval summaries
pub const TOTAL_LABEL: &str = "TOTAL";
