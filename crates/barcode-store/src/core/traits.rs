//! Store abstractions consumed by the ingestion engine and the HTTP facade.
//!
//! - [`TableStore`]: the transactional write contract used by an import. It
//!   takes `&mut self` throughout because an import owns one connection and
//!   one open transaction for its whole run.
//! - [`LookupStore`]: shared, read-mostly operations behind the lookup API
//!   and the CLI helpers.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::schema::ColumnSpec;
use crate::error::Result;

/// One row of string values, in table column order.
pub type Row = Vec<String>;

/// Transactional table writer used by an import.
///
/// Implementations must not be shared between concurrent imports of the same
/// table; callers serialize imports per table.
#[async_trait]
pub trait TableStore: Send {
    /// Check if a table exists.
    async fn table_exists(&mut self, table: &str) -> Result<bool>;

    /// Create a table whose columns are exactly `columns`, in order.
    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<()>;

    /// Insert rows, silently dropping any that collide with an existing
    /// primary key (including earlier rows of the same call).
    ///
    /// Returns the number of rows actually inserted. Rows stay pending until
    /// [`commit`](Self::commit).
    async fn insert_ignore_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64>;

    /// Make pending inserts durable.
    async fn commit(&mut self) -> Result<()>;

    /// Discard pending inserts.
    async fn rollback(&mut self) -> Result<()>;
}

/// Read-side operations behind the lookup API.
#[async_trait]
pub trait LookupStore: Send + Sync {
    /// Names of all tables in the database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Fetch `value_column` of the first row whose `key_column` equals `key`.
    ///
    /// A missing table is reported as `Ok(None)`, the same as a missing row.
    async fn lookup(
        &self,
        table: &str,
        value_column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<String>>;

    /// All rows of a table as JSON objects keyed by column name.
    async fn table_rows(&self, table: &str) -> Result<Vec<Map<String, Value>>>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Drop a table if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;
}

/// A table name with its row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
}

/// List every table with its row count, in `list_tables` order.
pub async fn table_summaries<S: LookupStore + ?Sized>(store: &S) -> Result<Vec<TableSummary>> {
    let mut summaries = Vec::new();
    for table in store.list_tables().await? {
        let rows = store.row_count(&table).await?;
        summaries.push(TableSummary { table, rows });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeclaredType;
    use crate::drivers::MemoryStore;

    #[tokio::test]
    async fn test_table_summaries_count_rows() {
        let store = MemoryStore::new();
        let columns = vec![ColumnSpec::new("code", DeclaredType::VarChar(20)).primary_key()];
        store.seed_table(
            "eanref",
            columns.clone(),
            vec![vec!["1".to_string()], vec!["2".to_string()]],
        );
        store.seed_table("stores", columns, vec![]);

        let summaries = table_summaries(&store).await.unwrap();
        assert_eq!(
            summaries,
            vec![
                TableSummary { table: "eanref".into(), rows: 2 },
                TableSummary { table: "stores".into(), rows: 0 },
            ]
        );
    }
}
