//! Attribute filter builder.
//!
//! Each active category of a [`FilterSelection`] becomes one SQL boolean
//! fragment. Fragments are joined with `AND`; an open selection yields an
//! empty string.

use crate::error::Result;
use crate::models::{FilterSelection, Period};
use crate::query::{literal_array, quote_literal};
use crate::schema::{COL_DATE, COL_GEOMETRY_TYPE, COL_SOURCE, COL_YEAR};
use chrono::{Datelike, Local, NaiveDate};

#[derive(Debug, Clone, Copy)]
pub struct FilterBuilder {
    today: NaiveDate,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl FilterBuilder {
    /// Builder whose relative periods are computed from `today`
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// One fragment per active category, in emission order
    pub fn fragments(&self, selection: &FilterSelection) -> Result<Vec<String>> {
        selection.validate()?;

        let mut fragments: Vec<String> = selection
            .active_ranks()
            .map(|(rank, values)| format!("{} = ANY({})", rank.column(), literal_array(values)))
            .collect();

        if let Some(period) = self.period_fragment(&selection.period) {
            fragments.push(period);
        }

        if !selection.sources.is_empty() {
            let patterns = selection.sources.iter().map(|s| format!("{}%", s));
            fragments.push(format!("{} ILIKE ANY({})", COL_SOURCE, literal_array(patterns)));
        }

        if !selection.geometry_kinds.is_empty() {
            let tokens = selection.geometry_kinds.iter().flat_map(|kind| kind.db_tokens());
            fragments.push(format!("{} = ANY({})", COL_GEOMETRY_TYPE, literal_array(tokens)));
        }

        // Trusted: power users type raw SQL here on purpose
        if let Some(extra) = &selection.extra_where {
            fragments.push(format!("({})", extra));
        }

        Ok(fragments)
    }

    /// All fragments joined with `AND`, or an empty string
    pub fn build(&self, selection: &FilterSelection) -> Result<String> {
        Ok(self.fragments(selection)?.join(" AND "))
    }

    fn period_fragment(&self, period: &Period) -> Option<String> {
        let year = self.today.year();
        match period {
            Period::All => None,
            Period::LastYears(n) => Some(format!(
                "({col} >= {from} AND {col} < {year})",
                col = COL_YEAR,
                from = year - i32::from(*n),
                year = year
            )),
            Period::ThisYear => Some(format!("({} = {})", COL_YEAR, year)),
            Period::Range { start, end } => Some(format!(
                "({} BETWEEN {} AND {})",
                COL_DATE,
                quote_literal(&start.format("%Y-%m-%d").to_string()),
                quote_literal(&end.format("%Y-%m-%d").to_string())
            )),
        }
    }
}
