use async_trait::async_trait;
use biodiv_core::error::{BiodivError, Result};
use biodiv_core::models::{ColumnInfo, ResultSet};
use biodiv_core::ports::QueryExecutor;
use serde_json::{Map, Value};
use sqlx::{Column, Executor, Statement, TypeInfo};

use super::{db_error, PostgresStore};

#[async_trait]
impl QueryExecutor for PostgresStore {
    async fn execute(&self, statement: &str) -> Result<()> {
        sqlx::raw_sql(statement)
            .execute(self.pool())
            .await
            .map_err(|e| db_error("Statement failed", e))?;
        Ok(())
    }

    async fn describe(&self, query: &str) -> Result<Vec<ColumnInfo>> {
        // Preparing plans the query without running it
        let statement = self
            .pool()
            .prepare(query)
            .await
            .map_err(|e| db_error("Failed to prepare query", e))?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| ColumnInfo::new(column.name(), column.type_info().name()))
            .collect())
    }

    async fn count_rows(&self, query: &str) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM ({}) AS q", query);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(self.pool())
            .await
            .map_err(|e| db_error("Failed to count rows", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch_rows(&self, query: &str, limit: Option<usize>) -> Result<ResultSet> {
        let columns: Vec<String> =
            self.describe(query).await?.into_iter().map(|c| c.name).collect();

        // Rows come back as JSON so any column type (geometry included) maps to a value
        let mut sql = format!("SELECT row_to_json(q)::text FROM ({}) AS q", query);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let documents: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| db_error("Failed to fetch rows", e))?;

        let mut result = ResultSet::new(columns);
        for document in documents {
            let mut object: Map<String, Value> = serde_json::from_str(&document)
                .map_err(|e| BiodivError::Serialization(format!("Invalid row JSON: {}", e)))?;
            let row = result
                .columns
                .iter()
                .map(|name| object.remove(name).unwrap_or(Value::Null))
                .collect();
            result.rows.push(row);
        }

        tracing::debug!("Fetched {} row(s)", result.rows.len());
        Ok(result)
    }
}
