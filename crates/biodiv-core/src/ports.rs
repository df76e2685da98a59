//! Ports implemented by the storage adapters.

use crate::error::Result;
use crate::lookup::LookupCategory;
use crate::models::{ColumnInfo, ResultSet};
use async_trait::async_trait;

/// Port for running analysis SQL against the observation database
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement that returns no rows (DDL, DROP, ...)
    async fn execute(&self, statement: &str) -> Result<()>;

    /// Column names and types a query would return, without running it
    async fn describe(&self, query: &str) -> Result<Vec<ColumnInfo>>;

    /// Number of rows a query returns
    async fn count_rows(&self, query: &str) -> Result<u64>;

    /// Fetch rows, optionally capped to `limit`
    async fn fetch_rows(&self, query: &str, limit: Option<usize>) -> Result<ResultSet>;
}

/// Port for reading enumerations offered as filter choices
#[async_trait]
pub trait LookupSource: Send + Sync {
    /// Distinct values of a category, in display order
    async fn fetch_values(&self, category: LookupCategory) -> Result<Vec<String>>;
}
