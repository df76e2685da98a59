use async_trait::async_trait;
use biodiv_core::error::Result;
use biodiv_core::lookup::LookupCategory;
use biodiv_core::ports::LookupSource;

use super::{db_error, PostgresStore};

#[async_trait]
impl LookupSource for PostgresStore {
    async fn fetch_values(&self, category: LookupCategory) -> Result<Vec<String>> {
        let sql = category.distinct_values_sql();
        tracing::debug!("{}", sql);

        sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| db_error(&format!("Failed to read {} values", category), e))
    }
}
