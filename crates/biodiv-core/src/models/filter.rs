//! User filter selections for a single analysis request.

use crate::error::{BiodivError, Result};
use crate::models::geometry::GeometryKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Taxonomic rank, in the order filter fragments are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaxonomicRank {
    GroupeTaxo,
    Regne,
    Phylum,
    Classe,
    Ordre,
    Famille,
    Group1Inpn,
    Group2Inpn,
    /// Only meaningful as an aggregation rank
    Species,
}

impl TaxonomicRank {
    /// Ranks that can carry a filter selection
    pub const FILTERABLE: [TaxonomicRank; 8] = [
        TaxonomicRank::GroupeTaxo,
        TaxonomicRank::Regne,
        TaxonomicRank::Phylum,
        TaxonomicRank::Classe,
        TaxonomicRank::Ordre,
        TaxonomicRank::Famille,
        TaxonomicRank::Group1Inpn,
        TaxonomicRank::Group2Inpn,
    ];

    /// Unqualified column name, used in filter fragments and as output label
    pub fn column(&self) -> &'static str {
        match self {
            TaxonomicRank::GroupeTaxo => "groupe_taxo",
            TaxonomicRank::Regne => "regne",
            TaxonomicRank::Phylum => "phylum",
            TaxonomicRank::Classe => "classe",
            TaxonomicRank::Ordre => "ordre",
            TaxonomicRank::Famille => "famille",
            TaxonomicRank::Group1Inpn => "group1_inpn",
            TaxonomicRank::Group2Inpn => "group2_inpn",
            TaxonomicRank::Species => "nom_sci",
        }
    }

    /// Alias-qualified column expression for GROUP BY clauses
    pub fn qualified_column(&self) -> String {
        match self {
            TaxonomicRank::GroupeTaxo | TaxonomicRank::Species => format!("obs.{}", self.column()),
            _ => format!("t.{}", self.column()),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TaxonomicRank::GroupeTaxo => "Taxonomic groups",
            TaxonomicRank::Regne => "Kingdoms",
            TaxonomicRank::Phylum => "Phyla",
            TaxonomicRank::Classe => "Classes",
            TaxonomicRank::Ordre => "Orders",
            TaxonomicRank::Famille => "Families",
            TaxonomicRank::Group1Inpn => "INPN groups 1",
            TaxonomicRank::Group2Inpn => "INPN groups 2",
            TaxonomicRank::Species => "Species",
        }
    }
}

impl fmt::Display for TaxonomicRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TaxonomicRank {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "groupe_taxo" | "group" => Ok(TaxonomicRank::GroupeTaxo),
            "regne" | "kingdom" => Ok(TaxonomicRank::Regne),
            "phylum" => Ok(TaxonomicRank::Phylum),
            "classe" | "class" => Ok(TaxonomicRank::Classe),
            "ordre" | "order" => Ok(TaxonomicRank::Ordre),
            "famille" | "family" => Ok(TaxonomicRank::Famille),
            "group1_inpn" => Ok(TaxonomicRank::Group1Inpn),
            "group2_inpn" => Ok(TaxonomicRank::Group2Inpn),
            "species" | "espece" | "nom_sci" => Ok(TaxonomicRank::Species),
            _ => Err(BiodivError::ConfigInvalid {
                key: "taxonomic_rank".to_string(),
                reason: format!("Unknown taxonomic rank: {}", s),
            }),
        }
    }
}

/// Observation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Period {
    /// No temporal filter
    #[default]
    All,
    /// The N complete years before the current one
    LastYears(u16),
    /// Current calendar year
    ThisYear,
    /// Explicit inclusive date range
    Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// Build an explicit range, rejecting an end that precedes the start
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let period = Period::Range { start, end };
        period.validate()?;
        Ok(period)
    }

    pub fn validate(&self) -> Result<()> {
        if let Period::Range { start, end } = self {
            if end < start {
                return Err(BiodivError::InvalidDateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => write!(f, "no temporal filter"),
            Period::LastYears(n) => write!(f, "last {} years", n),
            Period::ThisYear => write!(f, "this year"),
            Period::Range { start, end } => write!(f, "{} to {}", start, end),
        }
    }
}

/// Everything the user selected to narrow down observations
///
/// Empty categories are open: they contribute no filter fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub taxa: BTreeMap<TaxonomicRank, Vec<String>>,
    pub period: Period,
    pub sources: Vec<String>,
    pub geometry_kinds: BTreeSet<GeometryKind>,
    /// Raw SQL condition appended verbatim. Trusted input.
    pub extra_where: Option<String>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values for a taxonomic rank, collapsing duplicates
    pub fn with_taxa<I, S>(mut self, rank: TaxonomicRank, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.taxa.entry(rank).or_default();
        for value in values {
            push_unique(entry, value.into());
        }
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for source in sources {
            push_unique(&mut self.sources, source.into());
        }
        self
    }

    pub fn with_geometry_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = GeometryKind>,
    {
        self.geometry_kinds.extend(kinds);
        self
    }

    pub fn with_extra_where(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.extra_where = if condition.trim().is_empty() { None } else { Some(condition) };
        self
    }

    /// Ranks that carry at least one selected value
    pub fn active_ranks(&self) -> impl Iterator<Item = (&TaxonomicRank, &Vec<String>)> {
        self.taxa.iter().filter(|(_, values)| !values.is_empty())
    }

    /// True when no category narrows the selection
    pub fn is_open(&self) -> bool {
        self.active_ranks().next().is_none()
            && self.period == Period::All
            && self.sources.is_empty()
            && self.geometry_kinds.is_empty()
            && self.extra_where.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((rank, _)) = self.active_ranks().find(|(rank, _)| !TaxonomicRank::FILTERABLE.contains(rank)) {
            return Err(BiodivError::ConfigInvalid {
                key: "taxon".to_string(),
                reason: format!("{} can only be used to group results, not as a filter", rank.display_name()),
            });
        }
        self.period.validate()
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_range_rejects_reversed_dates() {
        let result = Period::range(date("2023-06-01"), date("2023-01-01"));
        assert!(matches!(result, Err(BiodivError::InvalidDateRange { .. })));

        assert!(Period::range(date("2023-01-01"), date("2023-01-01")).is_ok());
    }

    #[test]
    fn test_duplicates_collapsed_in_order() {
        let selection = FilterSelection::new()
            .with_taxa(TaxonomicRank::GroupeTaxo, ["Oiseaux", "Mammifères", "Oiseaux"])
            .with_sources(["vn", "vn", "ff"]);

        assert_eq!(selection.taxa[&TaxonomicRank::GroupeTaxo], vec!["Oiseaux", "Mammifères"]);
        assert_eq!(selection.sources, vec!["vn", "ff"]);
    }

    #[test]
    fn test_open_selection() {
        assert!(FilterSelection::new().is_open());
        assert!(FilterSelection::new().with_extra_where("   ").is_open());
        assert!(FilterSelection::new()
            .with_taxa(TaxonomicRank::Regne, Vec::<String>::new())
            .is_open());
        assert!(!FilterSelection::new().with_period(Period::ThisYear).is_open());
    }

    #[test]
    fn test_species_is_not_a_filter_rank() {
        let selection = FilterSelection::new().with_taxa(TaxonomicRank::Species, ["Parus major"]);
        assert!(matches!(selection.validate(), Err(BiodivError::ConfigInvalid { ref key, .. }) if key == "taxon"));

        // An empty selection for the rank stays open
        let empty = FilterSelection::new().with_taxa(TaxonomicRank::Species, Vec::<String>::new());
        assert!(empty.validate().is_ok());
    }

    #[test]
    fn test_rank_columns() {
        assert_eq!(TaxonomicRank::GroupeTaxo.qualified_column(), "obs.groupe_taxo");
        assert_eq!(TaxonomicRank::Classe.qualified_column(), "t.classe");
        assert_eq!("order".parse::<TaxonomicRank>().unwrap(), TaxonomicRank::Ordre);
        assert_eq!("group1-inpn".parse::<TaxonomicRank>().unwrap(), TaxonomicRank::Group1Inpn);
    }
}
