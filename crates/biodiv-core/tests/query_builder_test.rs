//! End-to-end tests for request assembly
//!
//! These tests go from a study area and a filter selection to the final SQL,
//! without a database.

use biodiv_core::analysis::{build_query, AnalysisKind, AnalysisRequest, AreaType, IntervalOptions, OutputOptions};
use biodiv_core::config::LayeredConfig;
use biodiv_core::models::{FilterSelection, GeometryKind, Period, StudyArea, StudyFeature, TaxonomicRank};
use biodiv_core::query::{Aggregate, FilterBuilder, Granularity, SpatialPredicateBuilder};
use biodiv_core::{models::Crs, BiodivError};
use chrono::NaiveDate;
use geo::polygon;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

fn lambert_square() -> StudyArea {
    let square = polygon![
        (x: 700000.0, y: 6600000.0),
        (x: 701000.0, y: 6600000.0),
        (x: 701000.0, y: 6601000.0),
        (x: 700000.0, y: 6601000.0),
        (x: 700000.0, y: 6600000.0),
    ];
    StudyArea::new("commune", "EPSG:2154").with_feature(StudyFeature::new("1", square))
}

#[test]
fn test_single_polygon_without_filters() {
    let area = lambert_square();

    let predicate = SpatialPredicateBuilder::new(Crs::lambert93()).build(&area).unwrap();
    assert!(predicate.starts_with("(select st_union(ST_PolygonFromText('POLYGON(("));
    assert!(predicate.ends_with("', 2154)))"));
    assert!(!predicate.contains("ST_Transform"));

    let filters = FilterBuilder::new(today()).build(&FilterSelection::new()).unwrap();
    assert_eq!(filters, "");
}

#[test]
fn test_group_and_this_year() {
    let selection = FilterSelection::new()
        .with_taxa(TaxonomicRank::GroupeTaxo, ["Oiseaux"])
        .with_period(Period::ThisYear);

    assert_eq!(
        FilterBuilder::new(today()).build(&selection).unwrap(),
        "groupe_taxo = ANY(array['Oiseaux']) AND (date_an = 2024)"
    );
}

#[test]
fn test_reversed_range_is_rejected() {
    let selection = FilterSelection::new().with_period(Period::Range {
        start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    });

    assert!(matches!(
        FilterBuilder::new(today()).build(&selection),
        Err(BiodivError::InvalidDateRange { .. })
    ));
}

#[test]
fn test_point_geometry_expands_to_both_tokens() {
    let selection = FilterSelection::new().with_geometry_kinds([GeometryKind::Point]);

    assert_eq!(
        FilterBuilder::new(today()).build(&selection).unwrap(),
        "type_geom = ANY(array['ST_Point','ST_MultiPoint'])"
    );
}

#[test]
fn test_every_analysis_fills_all_placeholders() {
    let config = LayeredConfig::with_defaults();
    let selection = FilterSelection::new()
        .with_taxa(TaxonomicRank::Regne, ["Animalia"])
        .with_period(Period::LastYears(5))
        .with_sources(["vn"]);

    for kind in AnalysisKind::ALL {
        let request = AnalysisRequest::new(kind, lambert_square())
            .with_filters(selection.clone())
            .with_taxonomic_rank(TaxonomicRank::Classe)
            .with_areas_type(AreaType::Commune);

        let prepared = build_query(&request, &config, today()).unwrap();
        assert!(!prepared.sql.contains('{'), "{} left a placeholder:\n{}", kind, prepared.sql);
        assert!(prepared.sql.contains(&prepared.spatial_predicate));
        assert!(prepared.sql.contains("AND regne = ANY(array['Animalia'])"));
        assert!(prepared.sql.starts_with("SELECT row_number() OVER () AS id"));
    }
}

#[test]
fn test_time_interval_summary_monthly() {
    let config = LayeredConfig::with_defaults();
    let request = AnalysisRequest::new(AnalysisKind::TimeIntervalSummary, lambert_square())
        .with_filters(FilterSelection::new().with_period(Period::ThisYear))
        .with_interval(IntervalOptions { granularity: Granularity::Monthly, aggregate: Aggregate::Species });

    let prepared = build_query(&request, &config, today()).unwrap();

    assert_eq!(prepared.bucket_labels, vec!["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"]);
    assert!(prepared.sql.contains(
        "COUNT(DISTINCT t.cd_ref) FILTER (WHERE obs.date_an = 2024 AND extract(month FROM obs.date) = 5) AS \"2024-05\""
    ));
    assert!(prepared.sql.contains("COUNT(DISTINCT t.cd_ref) AS \"TOTAL\""));
    assert!(prepared.sql.contains("obs.groupe_taxo AS groupe_taxo"));
}

#[test]
fn test_time_interval_needs_a_period() {
    let config = LayeredConfig::with_defaults();
    let request = AnalysisRequest::new(AnalysisKind::TimeIntervalSummary, lambert_square());

    assert!(matches!(
        build_query(&request, &config, today()),
        Err(BiodivError::UnboundedInterval { .. })
    ));
}

#[test]
fn test_wgs84_area_is_reprojected() {
    let square = polygon![
        (x: 2.30, y: 48.85),
        (x: 2.31, y: 48.85),
        (x: 2.31, y: 48.86),
        (x: 2.30, y: 48.85),
    ];
    let area = StudyArea::new("paris", "EPSG:4326")
        .with_feature(StudyFeature::new("a", square.clone()))
        .with_feature(StudyFeature::new("b", square));

    let request = AnalysisRequest::new(AnalysisKind::ExtractObservations, area);
    let prepared = build_query(&request, &LayeredConfig::with_defaults(), today()).unwrap();

    assert!(prepared.spatial_predicate.starts_with("(select st_union(array[ST_Transform(ST_PolygonFromText("));
    assert_eq!(prepared.spatial_predicate.matches(", 4326), 2154)").count(), 2);
}

#[test]
fn test_missing_histogram_destination_fails_first() {
    // Reversed range would fail too; the destination check comes first
    let selection = FilterSelection::new().with_period(Period::Range {
        start: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    });
    let request = AnalysisRequest::new(AnalysisKind::KnowledgeState, StudyArea::new("empty", "EPSG:2154"))
        .with_filters(selection)
        .with_output(OutputOptions { histogram: true, ..Default::default() });

    assert!(matches!(
        build_query(&request, &LayeredConfig::with_defaults(), today()),
        Err(BiodivError::MissingOutputDestination { .. })
    ));
}

#[test]
fn test_empty_study_area() {
    let request = AnalysisRequest::new(AnalysisKind::SpeciesSummary, StudyArea::new("empty", "EPSG:2154"));
    assert!(matches!(
        build_query(&request, &LayeredConfig::with_defaults(), today()),
        Err(BiodivError::EmptyStudyArea)
    ));
}
