//! Result materializer: binds the final query to a layer and validates it.

use crate::analysis::PreparedQuery;
use crate::error::{BiodivError, Result};
use crate::models::layer::quote_ident;
use crate::models::{LayerSource, LayerState, OutputMode, ResultLayer};
use crate::ports::QueryExecutor;
use crate::schema::COL_ID;

pub struct ResultMaterializer<'a, E: QueryExecutor + ?Sized> {
    executor: &'a E,
    schema: String,
}

impl<'a, E: QueryExecutor + ?Sized> ResultMaterializer<'a, E> {
    pub fn new(executor: &'a E, schema: impl Into<String>) -> Self {
        Self { executor, schema: schema.into() }
    }

    /// Bind `query` according to `mode` and validate the resulting layer.
    ///
    /// Returns the layer in `Validated` state. Any executor failure, or a
    /// relation without columns, ends in `InvalidResultLayer`. An empty
    /// result set is valid.
    pub async fn materialize(&self, query: &PreparedQuery, mode: OutputMode) -> Result<ResultLayer> {
        let mut layer = ResultLayer::new(query.layer_name.clone());
        layer.bucket_labels = query.bucket_labels.clone();

        let source = match mode {
            OutputMode::Query => LayerSource::Query { sql: query.sql.clone() },
            OutputMode::Table => {
                layer.transition(LayerState::Materializing)?;
                let table = simplify_name(&query.layer_name);
                if let Err(e) = self.create_table(&table, &query.sql).await {
                    return Err(self.fail(&mut layer, e));
                }
                LayerSource::Table { schema: self.schema.clone(), table }
            }
        };

        layer.source = Some(source.clone());
        layer.transition(LayerState::Bound)?;

        if let Err(e) = self.validate(&mut layer, &source).await {
            return Err(self.fail(&mut layer, e));
        }

        layer.transition(LayerState::Validated)?;
        tracing::info!(
            "Layer '{}' validated: {} column(s), {} row(s)",
            layer.name,
            layer.columns.len(),
            layer.row_count.unwrap_or(0)
        );
        Ok(layer)
    }

    /// Drop, create, then add the primary key. Three separate statements;
    /// a failure part-way leaves whatever was already done in place.
    async fn create_table(&self, table: &str, sql: &str) -> Result<()> {
        for statement in materialize_statements(&self.schema, table, sql) {
            tracing::debug!("Executing: {}", first_line(&statement));
            self.executor.execute(&statement).await?;
        }
        Ok(())
    }

    async fn validate(&self, layer: &mut ResultLayer, source: &LayerSource) -> Result<()> {
        let select = source.select_sql();

        let columns = self.executor.describe(&select).await?;
        if columns.is_empty() {
            return Err(BiodivError::InvalidResultLayer {
                layer: layer.name.clone(),
                reason: "query returns no columns".to_string(),
            });
        }

        layer.columns = columns;
        layer.row_count = Some(self.executor.count_rows(&select).await?);
        Ok(())
    }

    fn fail(&self, layer: &mut ResultLayer, error: BiodivError) -> BiodivError {
        tracing::error!("Layer '{}' failed: {}", layer.name, error);
        // Failed is reachable from every non-terminal state
        let _ = layer.transition(LayerState::Failed);

        match error {
            BiodivError::InvalidResultLayer { .. } => error,
            other => BiodivError::InvalidResultLayer {
                layer: layer.name.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Statements materializing `sql` as `schema.table`
pub fn materialize_statements(schema: &str, table: &str, sql: &str) -> [String; 3] {
    let target = format!("{}.{}", quote_ident(schema), quote_ident(table));
    [
        format!("DROP TABLE IF EXISTS {}", target),
        format!("CREATE TABLE {} AS {}", target, sql),
        format!("ALTER TABLE {} ADD PRIMARY KEY ({})", target, COL_ID),
    ]
}

/// Table name derived from a display name: lowercase ASCII, `_` separators
pub fn simplify_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' | 'ì' => 'i',
            'ô' | 'ö' | 'ó' | 'ò' | 'õ' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ÿ' => 'y',
            'ç' => 'c',
            'ñ' => 'n',
            'œ' => {
                out.push('o');
                'e'
            }
            'æ' => {
                out.push('a');
                'e'
            }
            c if c.is_ascii_alphanumeric() => c,
            _ => '_',
        };
        if folded == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(folded);
    }

    let trimmed = out.trim_end_matches('_');
    let name = if trimmed.is_empty() { "result" } else { trimmed };
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t_{}", name)
    } else {
        name.to_string()
    }
}

fn first_line(statement: &str) -> &str {
    statement.lines().next().unwrap_or_default()
}
