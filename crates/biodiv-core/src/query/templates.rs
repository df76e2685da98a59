//! SQL templates with named `{placeholder}` slots.
//!
//! Filling is a single left-to-right pass: substituted text is never scanned
//! again, so a value that happens to contain braces is left alone. Any slot
//! without a binding is an error; nothing unresolved reaches the database.

use crate::error::{BiodivError, Result};
use crate::schema::{area_links, area_types, areas, observations, taxref};
use std::collections::BTreeMap;

pub const ARRAY_POLYGONS: &str = "array_polygons";
pub const WHERE_FILTERS: &str = "where_filters";
pub const TAXONOMIC_RANK_DB: &str = "taxonomic_rank_db";
pub const TAXONOMIC_RANK_LABEL: &str = "taxonomic_rank_label";
pub const AREAS_TYPE: &str = "areas_type";
pub const INTERVAL_COLUMNS: &str = "interval_columns";

/// A named SQL template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Placeholder values for one fill
#[derive(Debug, Clone, Default)]
pub struct TemplateBindings {
    values: BTreeMap<&'static str, String>,
}

impl TemplateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, placeholder: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(placeholder, value.into());
        self
    }

    /// Bind the joined filter string; non-empty filters are prefixed with
    /// `AND` so they extend the template's own WHERE clause.
    pub fn bind_filters(self, filters: &str) -> Self {
        if filters.is_empty() {
            self.bind(WHERE_FILTERS, "")
        } else {
            self.bind(WHERE_FILTERS, format!("\n  AND {}", filters))
        }
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.values.get(placeholder).map(String::as_str)
    }
}

impl QueryTemplate {
    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for (_, name) in scan(self.sql) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Substitute every placeholder
    pub fn fill(&self, bindings: &TemplateBindings) -> Result<String> {
        let mut out = String::with_capacity(self.sql.len() * 2);
        let mut cursor = 0;

        for (start, name) in scan(self.sql) {
            let value = bindings.get(name).ok_or_else(|| BiodivError::UnresolvedPlaceholder {
                template: self.name.to_string(),
                placeholder: name.to_string(),
            })?;
            out.push_str(&self.sql[cursor..start]);
            out.push_str(value);
            cursor = start + name.len() + 2;
        }
        out.push_str(&self.sql[cursor..]);

        Ok(out)
    }
}

/// Find `{identifier}` tokens, returning their byte offset and name
fn scan(sql: &'static str) -> Vec<(usize, &'static str)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            let rest = &sql[i + 1..];
            let len = rest
                .bytes()
                .take_while(|b| b.is_ascii_lowercase() || *b == b'_')
                .count();
            if len > 0 && rest.as_bytes().get(len) == Some(&b'}') {
                found.push((i, &rest[..len]));
                i += len + 2;
                continue;
            }
        }
        i += 1;
    }

    found
}

/// Raw observations intersecting the study area
pub const EXTRACT_OBSERVATIONS: QueryTemplate = QueryTemplate {
    name: "extract_observations",
    sql: concat!("SELECT row_number() OVER () AS id,
       obs.id_synthese, obs.source, obs.groupe_taxo,
       t.regne, t.classe, t.ordre, t.famille, t.cd_ref,
       obs.nom_vern, obs.nom_sci, obs.nombre_total,
       obs.date, obs.date_an, obs.observateur, obs.mortalite,
       obs.type_geom, obs.geom
FROM ", observations!(), " obs
LEFT JOIN ", taxref!(), " t ON t.cd_nom = obs.cd_nom
WHERE obs.is_valid AND obs.is_present
  AND ST_Intersects(obs.geom, {array_polygons}){where_filters}"),
};

/// One row per reference taxon
pub const SPECIES_SUMMARY: QueryTemplate = QueryTemplate {
    name: "species_summary",
    sql: concat!("SELECT row_number() OVER () AS id,
       obs.groupe_taxo, t.regne, t.phylum, t.classe, t.ordre, t.famille, t.cd_ref,
       string_agg(DISTINCT obs.nom_vern, ', ') AS nom_vern,
       string_agg(DISTINCT obs.nom_sci, ', ') AS nom_sci,
       COUNT(*) AS nb_donnees,
       COUNT(DISTINCT obs.observateur) AS nb_observateurs,
       COUNT(DISTINCT obs.date) AS nb_dates,
       COUNT(*) FILTER (WHERE obs.mortalite) AS nb_mortalite,
       MAX(obs.nombre_total) AS nb_individus_max,
       MIN(obs.date_an) AS premiere_observation,
       MAX(obs.date_an) AS derniere_observation
FROM ", observations!(), " obs
LEFT JOIN ", taxref!(), " t ON t.cd_nom = obs.cd_nom
WHERE obs.is_valid AND obs.is_present
  AND ST_Intersects(obs.geom, {array_polygons}){where_filters}
GROUP BY obs.groupe_taxo, t.regne, t.phylum, t.classe, t.ordre, t.famille, t.cd_ref
ORDER BY obs.groupe_taxo, t.regne, t.phylum, t.classe, t.ordre, t.famille, t.cd_ref"),
};

/// One row per taxon of the chosen rank, one column per time bucket
pub const TIME_INTERVAL_SUMMARY: QueryTemplate = QueryTemplate {
    name: "time_interval_summary",
    sql: concat!("SELECT row_number() OVER () AS id,
       {taxonomic_rank_db} AS {taxonomic_rank_label},
       {interval_columns}
FROM ", observations!(), " obs
LEFT JOIN ", taxref!(), " t ON t.cd_nom = obs.cd_nom
WHERE obs.is_valid AND obs.is_present
  AND ST_Intersects(obs.geom, {array_polygons}){where_filters}
GROUP BY {taxonomic_rank_db}
ORDER BY {taxonomic_rank_db}"),
};

/// Observation statistics per reference area (commune or grid cell)
pub const AREA_AGGREGATION: QueryTemplate = QueryTemplate {
    name: "area_aggregation",
    sql: concat!("SELECT row_number() OVER () AS id,
       la.area_name, la.area_code, bat.type_code,
       COUNT(*) AS nb_donnees,
       COUNT(DISTINCT t.cd_ref) AS nb_especes,
       COUNT(DISTINCT obs.observateur) AS nb_observateurs,
       COUNT(DISTINCT obs.date) AS nb_dates,
       MAX(obs.date_an) AS derniere_observation,
       la.geom
FROM ", observations!(), " obs
JOIN ", area_links!(), " cor ON cor.id_synthese = obs.id_synthese
JOIN ", areas!(), " la ON la.id_area = cor.id_area
JOIN ", area_types!(), " bat ON bat.id_type = la.id_type
LEFT JOIN ", taxref!(), " t ON t.cd_nom = obs.cd_nom
WHERE bat.type_code = '{areas_type}'
  AND obs.is_valid AND obs.is_present
  AND ST_Intersects(la.geom, {array_polygons}){where_filters}
GROUP BY la.id_area, la.area_name, la.area_code, bat.type_code, la.geom
ORDER BY la.area_code"),
};

/// State of knowledge: species and data counts per taxon of the chosen rank
pub const KNOWLEDGE_STATE: QueryTemplate = QueryTemplate {
    name: "knowledge_state",
    sql: concat!("SELECT row_number() OVER () AS id,
       {taxonomic_rank_db} AS {taxonomic_rank_label},
       COUNT(DISTINCT t.cd_ref) AS nb_especes,
       COUNT(*) AS nb_donnees,
       COUNT(DISTINCT obs.observateur) AS nb_observateurs,
       MIN(obs.date_an) AS premiere_observation,
       MAX(obs.date_an) AS derniere_observation
FROM ", observations!(), " obs
LEFT JOIN ", taxref!(), " t ON t.cd_nom = obs.cd_nom
WHERE obs.is_valid AND obs.is_present
  AND ST_Intersects(obs.geom, {array_polygons}){where_filters}
GROUP BY {taxonomic_rank_db}
ORDER BY nb_especes DESC"),
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    const SAMPLE: QueryTemplate = QueryTemplate {
        name: "sample",
        sql: "SELECT * FROM obs WHERE ST_Intersects(geom, {array_polygons}){where_filters}",
    };

    #[test]
    fn test_placeholders_listed_once() {
        assert_eq!(
            TIME_INTERVAL_SUMMARY.placeholders(),
            vec![TAXONOMIC_RANK_DB, TAXONOMIC_RANK_LABEL, INTERVAL_COLUMNS, ARRAY_POLYGONS, WHERE_FILTERS]
        );
        assert_eq!(AREA_AGGREGATION.placeholders(), vec![AREAS_TYPE, ARRAY_POLYGONS, WHERE_FILTERS]);
    }

    #[test]
    fn test_templates_use_schema_relations() {
        for template in [EXTRACT_OBSERVATIONS, SPECIES_SUMMARY, TIME_INTERVAL_SUMMARY, AREA_AGGREGATION, KNOWLEDGE_STATE] {
            assert!(template.sql.contains(&format!("FROM {} obs", schema::OBSERVATIONS)), "{}", template.name);
            assert!(template.sql.contains(&format!("JOIN {} t ON", schema::TAXREF)), "{}", template.name);
        }
        for relation in [schema::AREAS, schema::AREA_TYPES, schema::AREA_LINKS] {
            assert!(AREA_AGGREGATION.sql.contains(relation));
        }
    }

    #[test]
    fn test_fill_with_filters() {
        let bindings = TemplateBindings::new()
            .bind(ARRAY_POLYGONS, "(select st_union(g))")
            .bind_filters("regne = ANY(array['Plantae'])");

        assert_eq!(
            SAMPLE.fill(&bindings).unwrap(),
            "SELECT * FROM obs WHERE ST_Intersects(geom, (select st_union(g)))\n  AND regne = ANY(array['Plantae'])"
        );
    }

    #[test]
    fn test_fill_without_filters() {
        let bindings = TemplateBindings::new().bind(ARRAY_POLYGONS, "g").bind_filters("");
        assert_eq!(SAMPLE.fill(&bindings).unwrap(), "SELECT * FROM obs WHERE ST_Intersects(geom, g)");
    }

    #[test]
    fn test_missing_binding_fails() {
        let bindings = TemplateBindings::new().bind(ARRAY_POLYGONS, "g");
        match SAMPLE.fill(&bindings) {
            Err(BiodivError::UnresolvedPlaceholder { template, placeholder }) => {
                assert_eq!(template, "sample");
                assert_eq!(placeholder, WHERE_FILTERS);
            }
            other => panic!("Expected UnresolvedPlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn test_substituted_braces_not_rescanned() {
        let bindings = TemplateBindings::new()
            .bind(ARRAY_POLYGONS, "g")
            .bind_filters("(properties->>'k' = '{where_filters}')");
        let sql = SAMPLE.fill(&bindings).unwrap();
        assert!(sql.ends_with("AND (properties->>'k' = '{where_filters}')"));
    }
}
