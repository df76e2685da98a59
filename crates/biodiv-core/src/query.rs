//! SQL builders: spatial predicate, attribute filters, time buckets and the
//! template engine that stitches them together.

pub mod filters;
pub mod intervals;
pub mod spatial;
pub mod templates;

pub use filters::FilterBuilder;
pub use intervals::{Aggregate, Granularity, IntervalColumns};
pub use spatial::SpatialPredicateBuilder;
pub use templates::{QueryTemplate, TemplateBindings};

/// Render a string as an SQL literal, doubling embedded quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render values as `array['a','b']`
pub fn literal_array<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = values.into_iter().map(|v| quote_literal(v.as_ref())).collect();
    format!("array[{}]", items.join(","))
}
