//! In-memory adapters for development and testing.
//!
//! These implementations use `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state. For real analyses, use the PostgreSQL adapter.

use async_trait::async_trait;
use biodiv_core::error::{BiodivError, Result};
use biodiv_core::lookup::LookupCategory;
use biodiv_core::models::{ColumnInfo, ResultSet};
use biodiv_core::ports::{LookupSource, QueryExecutor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Query executor that records statements and replays a canned result.
///
/// Every query describes to the same columns and returns the same rows,
/// which is all the materializer needs to exercise its state machine.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    columns: Arc<RwLock<Vec<ColumnInfo>>>,
    rows: Arc<RwLock<Vec<Vec<Value>>>>,
    statements: Arc<RwLock<Vec<String>>>,
    /// Statements containing this text fail
    fail_on: Arc<RwLock<Option<String>>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns(self, columns: Vec<ColumnInfo>) -> Self {
        *self.columns.write().unwrap() = columns;
        self
    }

    pub fn with_rows(self, rows: Vec<Vec<Value>>) -> Self {
        *self.rows.write().unwrap() = rows;
        self
    }

    pub fn fail_on(self, needle: impl Into<String>) -> Self {
        *self.fail_on.write().unwrap() = Some(needle.into());
        self
    }

    /// Everything sent to the executor, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.read().unwrap().clone()
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.statements.write().unwrap().push(sql.to_string());

        match self.fail_on.read().unwrap().as_deref() {
            Some(needle) if sql.contains(needle) => {
                Err(BiodivError::Database(format!("simulated failure on '{}'", needle)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, statement: &str) -> Result<()> {
        self.record(statement)
    }

    async fn describe(&self, query: &str) -> Result<Vec<ColumnInfo>> {
        self.record(query)?;
        Ok(self.columns.read().unwrap().clone())
    }

    async fn count_rows(&self, query: &str) -> Result<u64> {
        self.record(query)?;
        Ok(self.rows.read().unwrap().len() as u64)
    }

    async fn fetch_rows(&self, query: &str, limit: Option<usize>) -> Result<ResultSet> {
        self.record(query)?;

        let columns = self.columns.read().unwrap().iter().map(|c| c.name.clone()).collect();
        let rows = self.rows.read().unwrap();
        let take = limit.unwrap_or(rows.len());

        let mut result = ResultSet::new(columns);
        result.rows = rows.iter().take(take).cloned().collect();
        Ok(result)
    }
}

/// Lookup source backed by fixed lists
#[derive(Debug, Clone, Default)]
pub struct MemoryLookupSource {
    values: Arc<RwLock<HashMap<LookupCategory, Vec<String>>>>,
    failing: Arc<RwLock<Option<LookupCategory>>>,
}

impl MemoryLookupSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, S>(self, category: LookupCategory, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .write()
            .unwrap()
            .insert(category, values.into_iter().map(Into::into).collect());
        self
    }

    /// Make one category fail, as an unreachable table would
    pub fn failing(self, category: LookupCategory) -> Self {
        *self.failing.write().unwrap() = Some(category);
        self
    }
}

#[async_trait]
impl LookupSource for MemoryLookupSource {
    async fn fetch_values(&self, category: LookupCategory) -> Result<Vec<String>> {
        if *self.failing.read().unwrap() == Some(category) {
            return Err(BiodivError::Database(format!("relation for {} is unreachable", category)));
        }
        Ok(self.values.read().unwrap().get(&category).cloned().unwrap_or_default())
    }
}
