//! Cached choice lists (taxonomic groups, kingdoms, data sources, ...).
//!
//! The cache is populated by an explicit refresh against a [`LookupSource`]
//! and persisted as TOML in the workspace. It is never invalidated
//! automatically; a stale cache only changes which choices are offered.

use crate::error::{BiodivError, Result};
use crate::models::TaxonomicRank;
use crate::ports::LookupSource;
use crate::schema::{COL_SOURCE, OBSERVATIONS, TAXREF};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LookupCategory {
    GroupeTaxo,
    Regne,
    Phylum,
    Classe,
    Ordre,
    Famille,
    Group1Inpn,
    Group2Inpn,
    SourceData,
}

impl LookupCategory {
    pub const ALL: [LookupCategory; 9] = [
        LookupCategory::GroupeTaxo,
        LookupCategory::Regne,
        LookupCategory::Phylum,
        LookupCategory::Classe,
        LookupCategory::Ordre,
        LookupCategory::Famille,
        LookupCategory::Group1Inpn,
        LookupCategory::Group2Inpn,
        LookupCategory::SourceData,
    ];

    /// Settings key
    pub fn key(&self) -> &'static str {
        match self {
            LookupCategory::SourceData => "source_data",
            other => other.rank().map(|r| r.column()).unwrap_or_default(),
        }
    }

    /// Taxonomic rank the category feeds, if any
    pub fn rank(&self) -> Option<TaxonomicRank> {
        match self {
            LookupCategory::GroupeTaxo => Some(TaxonomicRank::GroupeTaxo),
            LookupCategory::Regne => Some(TaxonomicRank::Regne),
            LookupCategory::Phylum => Some(TaxonomicRank::Phylum),
            LookupCategory::Classe => Some(TaxonomicRank::Classe),
            LookupCategory::Ordre => Some(TaxonomicRank::Ordre),
            LookupCategory::Famille => Some(TaxonomicRank::Famille),
            LookupCategory::Group1Inpn => Some(TaxonomicRank::Group1Inpn),
            LookupCategory::Group2Inpn => Some(TaxonomicRank::Group2Inpn),
            LookupCategory::SourceData => None,
        }
    }

    pub fn for_rank(rank: TaxonomicRank) -> Option<Self> {
        LookupCategory::ALL.into_iter().find(|c| c.rank() == Some(rank))
    }

    /// Relation and column the distinct values are read from
    pub fn source_relation(&self) -> (&'static str, &'static str) {
        match self {
            LookupCategory::GroupeTaxo => (OBSERVATIONS, "groupe_taxo"),
            LookupCategory::SourceData => (OBSERVATIONS, COL_SOURCE),
            other => (TAXREF, other.key()),
        }
    }

    /// `SELECT DISTINCT` statement listing the category values
    pub fn distinct_values_sql(&self) -> String {
        let (relation, column) = self.source_relation();
        format!(
            "SELECT DISTINCT {col}::text AS value FROM {rel} WHERE {col} IS NOT NULL ORDER BY 1",
            col = column,
            rel = relation
        )
    }
}

impl fmt::Display for LookupCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for LookupCategory {
    type Err = BiodivError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase().replace('-', "_");
        LookupCategory::ALL.into_iter().find(|c| c.key() == wanted).ok_or_else(|| {
            BiodivError::ConfigInvalid {
                key: "category".to_string(),
                reason: format!("Unknown lookup category: {}", s),
            }
        })
    }
}

/// Category name to ordered list of valid values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupCache {
    refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    lookups: BTreeMap<String, Vec<String>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file; a missing file is an empty cache
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            BiodivError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BiodivError::Serialization(format!("Failed to serialize lookups: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, category: LookupCategory) -> &[String] {
        self.lookups.get(category.key()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set(&mut self, category: LookupCategory, values: Vec<String>) {
        self.lookups.insert(category.key().to_string(), values);
    }

    /// Categories that hold at least one value
    pub fn categories(&self) -> Vec<LookupCategory> {
        LookupCategory::ALL.into_iter().filter(|c| !self.get(*c).is_empty()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.values().all(Vec::is_empty)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn mark_refreshed(&mut self, at: DateTime<Utc>) {
        self.refreshed_at = Some(at);
    }

    /// Selected values the cache does not offer.
    ///
    /// An empty category accepts everything: the cache has simply not been
    /// refreshed yet.
    pub fn unknown_values<'a>(
        &self,
        category: LookupCategory,
        selection: &'a [String],
    ) -> Vec<&'a str> {
        let known = self.get(category);
        if known.is_empty() {
            return Vec::new();
        }
        selection
            .iter()
            .filter(|value| !known.contains(value))
            .map(String::as_str)
            .collect()
    }
}

/// Outcome of one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub counts: Vec<(LookupCategory, usize)>,
}

impl RefreshSummary {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// Mirrors database enumerations into a [`LookupCache`]
pub struct LookupRefresher<'a, S: LookupSource + ?Sized> {
    source: &'a S,
    categories: Vec<LookupCategory>,
}

impl<'a, S: LookupSource + ?Sized> LookupRefresher<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source, categories: LookupCategory::ALL.to_vec() }
    }

    pub fn only(mut self, categories: Vec<LookupCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// Fetch every category and replace the cached lists.
    ///
    /// Nothing is written to the cache until every category was fetched, so
    /// a failed refresh leaves the previous values untouched.
    pub async fn refresh<F>(&self, cache: &mut LookupCache, mut on_progress: F) -> Result<RefreshSummary>
    where
        F: FnMut(LookupCategory, usize),
    {
        let mut fetched = Vec::with_capacity(self.categories.len());

        for category in &self.categories {
            let values = self.source.fetch_values(*category).await?;
            tracing::debug!("Fetched {} value(s) for {}", values.len(), category);
            on_progress(*category, values.len());
            fetched.push((*category, values));
        }

        let mut summary = RefreshSummary::default();
        for (category, values) in fetched {
            summary.counts.push((category, values.len()));
            cache.set(category, values);
        }
        cache.mark_refreshed(Utc::now());

        tracing::info!("Lookup cache refreshed: {} value(s)", summary.total());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_category_keys_round_trip() {
        for category in LookupCategory::ALL {
            assert_eq!(category.key().parse::<LookupCategory>().unwrap(), category);
        }
        assert_eq!(LookupCategory::SourceData.key(), "source_data");
        assert_eq!(LookupCategory::GroupeTaxo.key(), "groupe_taxo");
    }

    #[test]
    fn test_distinct_values_sql() {
        assert_eq!(
            LookupCategory::Regne.distinct_values_sql(),
            "SELECT DISTINCT regne::text AS value FROM taxonomie.taxref WHERE regne IS NOT NULL ORDER BY 1"
        );
        assert!(LookupCategory::SourceData
            .distinct_values_sql()
            .contains("FROM src_lpodatas.v_c_observations"));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache = LookupCache::load(dir.path().join("lookups.toml")).unwrap();
        assert!(cache.is_empty());
        assert!(cache.refreshed_at().is_none());
    }

    #[test]
    fn test_save_and_load_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lookups.toml");

        let mut cache = LookupCache::new();
        cache.set(LookupCategory::GroupeTaxo, vec!["Oiseaux".into(), "Amphibiens".into()]);
        cache.mark_refreshed(Utc::now());
        cache.save(&path).unwrap();

        let loaded = LookupCache::load(&path).unwrap();
        assert_eq!(loaded.get(LookupCategory::GroupeTaxo), ["Oiseaux", "Amphibiens"]);
        assert!(loaded.refreshed_at().is_some());
        assert!(loaded.get(LookupCategory::Regne).is_empty());
    }

    #[test]
    fn test_unknown_values() {
        let mut cache = LookupCache::new();
        cache.set(LookupCategory::SourceData, vec!["vn".into(), "ff".into()]);

        let selection = vec!["vn".to_string(), "obsdata".to_string()];
        assert_eq!(cache.unknown_values(LookupCategory::SourceData, &selection), vec!["obsdata"]);
        assert!(cache.unknown_values(LookupCategory::Regne, &selection).is_empty());
    }
}
