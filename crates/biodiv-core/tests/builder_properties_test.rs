//! Property tests for the filter, spatial and template builders

use biodiv_core::analysis::{build_query, AnalysisKind, AnalysisRequest};
use biodiv_core::config::LayeredConfig;
use biodiv_core::models::{Crs, FilterSelection, StudyArea, StudyFeature, TaxonomicRank};
use biodiv_core::query::{FilterBuilder, SpatialPredicateBuilder};
use chrono::NaiveDate;
use geo::{coord, Rect};
use proptest::prelude::*;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()
}

fn rank_strategy() -> impl Strategy<Value = TaxonomicRank> {
    prop::sample::select(TaxonomicRank::FILTERABLE.to_vec())
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-zéè' ]{1,12}"
}

fn area_strategy() -> impl Strategy<Value = StudyArea> {
    prop::collection::vec((0.0f64..1000.0, 0.0f64..1000.0, 1.0f64..50.0), 1..5).prop_map(|squares| {
        squares.into_iter().enumerate().fold(
            StudyArea::new("generated", "EPSG:4326"),
            |area, (idx, (x, y, size))| {
                let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size });
                area.with_feature(StudyFeature::new(idx.to_string(), rect.to_polygon()))
            },
        )
    })
}

proptest! {
    #[test]
    fn fragment_count_matches_active_ranks(
        selections in prop::collection::vec((rank_strategy(), prop::collection::vec(value_strategy(), 1..4)), 0..6)
    ) {
        let selection = selections
            .into_iter()
            .fold(FilterSelection::new(), |sel, (rank, values)| sel.with_taxa(rank, values));

        let expected = selection.active_ranks().count();
        let fragments = FilterBuilder::new(today()).fragments(&selection).unwrap();

        prop_assert_eq!(fragments.len(), expected);
        for fragment in &fragments {
            prop_assert!(fragment.contains(" = ANY(array['"));
        }
    }

    #[test]
    fn spatial_predicate_is_idempotent(area in area_strategy()) {
        let builder = SpatialPredicateBuilder::new(Crs::lambert93());
        let first = builder.build(&area).unwrap();
        let second = builder.build(&area).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.matches("ST_Transform(").count(), area.len());
    }

    #[test]
    fn filled_queries_have_no_placeholders(
        area in area_strategy(),
        values in prop::collection::vec(value_strategy(), 0..4),
        extra in prop::option::of("[a-z_]{1,10} > [0-9]{1,3}"),
    ) {
        let mut selection = FilterSelection::new().with_sources(values);
        if let Some(extra) = extra {
            selection = selection.with_extra_where(extra);
        }

        for kind in [AnalysisKind::ExtractObservations, AnalysisKind::SpeciesSummary, AnalysisKind::AreaAggregation] {
            let request = AnalysisRequest::new(kind, area.clone()).with_filters(selection.clone());
            let prepared = build_query(&request, &LayeredConfig::with_defaults(), today()).unwrap();
            prop_assert!(!prepared.sql.contains('{'), "unresolved placeholder in {}", kind);
            prop_assert!(!prepared.sql.contains('}'), "unresolved placeholder in {}", kind);
        }
    }
}
