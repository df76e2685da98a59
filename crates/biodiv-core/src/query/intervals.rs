//! Per-time-bucket count columns for time-interval summaries.

use crate::error::{BiodivError, Result};
use crate::models::Period;
use crate::models::layer::quote_ident;
use crate::schema::TOTAL_LABEL;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Width of a time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Granularity {
    #[default]
    Yearly,
    Monthly,
}

impl FromStr for Granularity {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "year" | "yearly" | "years" => Ok(Granularity::Yearly),
            "month" | "monthly" | "months" => Ok(Granularity::Monthly),
            _ => Err(BiodivError::ConfigInvalid {
                key: "granularity".to_string(),
                reason: format!("Unknown granularity: {}. Use year or month", s),
            }),
        }
    }
}

/// What is counted in each bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Aggregate {
    /// Number of observation records
    #[default]
    Observations,
    /// Number of distinct reference taxa
    Species,
}

impl Aggregate {
    pub fn sql(&self) -> &'static str {
        match self {
            Aggregate::Observations => "COUNT(*)",
            Aggregate::Species => "COUNT(DISTINCT t.cd_ref)",
        }
    }
}

impl FromStr for Aggregate {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "observations" | "data" | "records" => Ok(Aggregate::Observations),
            "species" | "taxa" => Ok(Aggregate::Species),
            _ => Err(BiodivError::ConfigInvalid {
                key: "aggregate".to_string(),
                reason: format!("Unknown aggregate: {}. Use observations or species", s),
            }),
        }
    }
}

/// Generated column list plus the bucket labels, in column order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalColumns {
    pub sql: String,
    pub labels: Vec<String>,
}

/// Build one `FILTER (WHERE ...)` column per bucket and a trailing total.
///
/// `analysis` only names the request in the error raised for `Period::All`.
pub fn interval_columns(
    analysis: &str,
    period: &Period,
    granularity: Granularity,
    aggregate: Aggregate,
    today: NaiveDate,
) -> Result<IntervalColumns> {
    period.validate()?;

    let (start, end) = bucket_bounds(analysis, period, granularity, today)?;
    let agg = aggregate.sql();

    let mut labels = Vec::new();
    let mut columns = Vec::new();

    match granularity {
        Granularity::Yearly => {
            for year in start.0..=end.0 {
                let label = year.to_string();
                columns.push(format!(
                    "{} FILTER (WHERE obs.date_an = {}) AS {}",
                    agg,
                    year,
                    quote_ident(&label)
                ));
                labels.push(label);
            }
        }
        Granularity::Monthly => {
            let (mut year, mut month) = start;
            while (year, month) <= end {
                let label = format!("{}-{:02}", year, month);
                columns.push(format!(
                    "{} FILTER (WHERE obs.date_an = {} AND extract(month FROM obs.date) = {}) AS {}",
                    agg,
                    year,
                    month,
                    quote_ident(&label)
                ));
                labels.push(label);

                if month == 12 {
                    year += 1;
                    month = 1;
                } else {
                    month += 1;
                }
            }
        }
    }

    columns.push(format!("{} AS {}", agg, quote_ident(TOTAL_LABEL)));

    Ok(IntervalColumns { sql: columns.join(",\n       "), labels })
}

/// First and last bucket as (year, month); month is 1 for yearly buckets
fn bucket_bounds(
    analysis: &str,
    period: &Period,
    granularity: Granularity,
    today: NaiveDate,
) -> Result<((i32, u32), (i32, u32))> {
    let year = today.year();
    let bounds = match period {
        Period::All => {
            return Err(BiodivError::UnboundedInterval { analysis: analysis.to_string() })
        }
        Period::LastYears(0) => {
            return Err(BiodivError::ConfigInvalid {
                key: "period".to_string(),
                reason: "last-years period needs at least one year".to_string(),
            })
        }
        Period::LastYears(n) => ((year - i32::from(*n), 1), (year - 1, 12)),
        Period::ThisYear => ((year, 1), (year, today.month())),
        Period::Range { start, end } => ((start.year(), start.month()), (end.year(), end.month())),
    };

    Ok(match granularity {
        Granularity::Yearly => ((bounds.0 .0, 1), (bounds.1 .0, 1)),
        Granularity::Monthly => bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_yearly_last_five_years() {
        let columns = interval_columns(
            "time_interval",
            &Period::LastYears(5),
            Granularity::Yearly,
            Aggregate::Observations,
            date("2024-03-10"),
        )
        .unwrap();

        assert_eq!(columns.labels, vec!["2019", "2020", "2021", "2022", "2023"]);
        assert!(columns.sql.starts_with("COUNT(*) FILTER (WHERE obs.date_an = 2019) AS \"2019\""));
        assert!(columns.sql.ends_with("COUNT(*) AS \"TOTAL\""));
        assert_eq!(columns.sql.matches("FILTER").count(), 5);
    }

    #[test]
    fn test_monthly_range_crosses_year() {
        let columns = interval_columns(
            "time_interval",
            &Period::Range { start: date("2022-11-15"), end: date("2023-02-01") },
            Granularity::Monthly,
            Aggregate::Species,
            date("2024-03-10"),
        )
        .unwrap();

        assert_eq!(columns.labels, vec!["2022-11", "2022-12", "2023-01", "2023-02"]);
        assert!(columns.sql.contains(
            "COUNT(DISTINCT t.cd_ref) FILTER (WHERE obs.date_an = 2023 AND extract(month FROM obs.date) = 1) AS \"2023-01\""
        ));
        assert!(columns.sql.ends_with("COUNT(DISTINCT t.cd_ref) AS \"TOTAL\""));
    }

    #[test]
    fn test_this_year_monthly_stops_at_current_month() {
        let columns = interval_columns(
            "time_interval",
            &Period::ThisYear,
            Granularity::Monthly,
            Aggregate::Observations,
            date("2024-03-10"),
        )
        .unwrap();
        assert_eq!(columns.labels, vec!["2024-01", "2024-02", "2024-03"]);
    }

    #[test]
    fn test_unbounded_period_fails() {
        let result = interval_columns(
            "time_interval",
            &Period::All,
            Granularity::Yearly,
            Aggregate::Observations,
            date("2024-03-10"),
        );
        assert!(matches!(result, Err(BiodivError::UnboundedInterval { .. })));
    }

    #[test]
    fn test_reversed_range_fails() {
        let result = interval_columns(
            "time_interval",
            &Period::Range { start: date("2023-06-01"), end: date("2023-01-01") },
            Granularity::Yearly,
            Aggregate::Observations,
            date("2024-03-10"),
        );
        assert!(matches!(result, Err(BiodivError::InvalidDateRange { .. })));
    }
}
