//! In-process store implementing both store traits.
//!
//! Backs `import --dry-run` and the tests. Clones share state, so a test can
//! hand one clone to an importer and inspect another afterwards. Inserted rows
//! stay pending until `commit`, and `rollback` discards them, matching the
//! transactional behavior of the MySQL session.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::schema::primary_key_index;
use crate::core::{ColumnSpec, LookupStore, Row, TableStore};
use crate::error::{Result, StoreError};

/// Call counters recorded by [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub exists_checks: u64,
    pub tables_created: u64,
    pub insert_calls: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Debug)]
struct MemTable {
    columns: Vec<ColumnSpec>,
    key: Option<usize>,
    committed: Vec<Row>,
    pending: Vec<Row>,
}

impl MemTable {
    fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            key: primary_key_index(&columns),
            columns,
            committed: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == column)
    }

    fn has_key(&self, key: &str) -> bool {
        match self.key {
            Some(k) => self
                .committed
                .iter()
                .chain(&self.pending)
                .any(|row| row[k] == key),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, MemTable>,
    stats: StoreStats,
    fail_on_insert: Option<u64>,
    batch_sizes: Vec<usize>,
}

/// Shared in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a table with already committed rows.
    pub fn seed_table(&self, name: &str, columns: Vec<ColumnSpec>, rows: Vec<Row>) {
        let mut table = MemTable::new(columns);
        table.committed = rows;
        self.lock().tables.insert(name.to_string(), table);
    }

    /// Make the `n`th insert call (1-based) fail.
    pub fn fail_on_insert(&self, n: u64) {
        self.lock().fail_on_insert = Some(n);
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats.clone()
    }

    /// Row count of every insert call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    pub fn column_names(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.columns.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Committed rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.committed.clone())
            .unwrap_or_default()
    }

    /// Inserted but not yet committed rows of a table.
    pub fn pending_rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.pending.clone())
            .unwrap_or_default()
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::NotFound(format!("table '{}'", table))
}

fn missing_column(table: &str, column: &str) -> StoreError {
    StoreError::NotFound(format!("column '{}' in table '{}'", column, table))
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.stats.exists_checks += 1;
        Ok(inner.tables.contains_key(table))
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<()> {
        let mut inner = self.lock();
        if inner.tables.contains_key(table) {
            return Err(StoreError::TableExists(table.to_string()));
        }
        inner.stats.tables_created += 1;
        inner
            .tables
            .insert(table.to_string(), MemTable::new(columns.to_vec()));
        Ok(())
    }

    async fn insert_ignore_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        let mut inner = self.lock();
        inner.stats.insert_calls += 1;
        let call = inner.stats.insert_calls;
        if inner.fail_on_insert == Some(call) {
            return Err(StoreError::pool(
                "simulated insert failure",
                format!("inserting into {}", table),
            ));
        }
        inner.batch_sizes.push(rows.len());

        let target = inner.tables.get_mut(table).ok_or_else(|| missing_table(table))?;
        let positions = columns
            .iter()
            .map(|c| target.position(c).ok_or_else(|| missing_column(table, c)))
            .collect::<Result<Vec<_>>>()?;

        let mut inserted = 0;
        for row in rows {
            if row.len() != positions.len() {
                return Err(StoreError::Config(format!(
                    "row has {} values for {} columns",
                    row.len(),
                    positions.len()
                )));
            }
            let mut full = vec![String::new(); target.columns.len()];
            for (value, &pos) in row.iter().zip(&positions) {
                full[pos] = value.clone();
            }
            if let Some(k) = target.key {
                if target.has_key(&full[k]) {
                    debug!("Ignoring duplicate key '{}' in {}", full[k], table);
                    continue;
                }
            }
            target.pending.push(full);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.stats.commits += 1;
        for table in inner.tables.values_mut() {
            let pending = std::mem::take(&mut table.pending);
            table.committed.extend(pending);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.stats.rollbacks += 1;
        for table in inner.tables.values_mut() {
            table.pending.clear();
        }
        Ok(())
    }
}

#[async_trait]
impl LookupStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.table_names())
    }

    async fn lookup(
        &self,
        table: &str,
        value_column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let inner = self.lock();
        let Some(t) = inner.tables.get(table) else {
            return Ok(None);
        };
        let key_pos = t
            .position(key_column)
            .ok_or_else(|| missing_column(table, key_column))?;
        let value_pos = t
            .position(value_column)
            .ok_or_else(|| missing_column(table, value_column))?;
        Ok(t
            .committed
            .iter()
            .find(|row| row[key_pos] == key)
            .map(|row| row[value_pos].clone()))
    }

    async fn table_rows(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let inner = self.lock();
        let t = inner.tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(t.committed
            .iter()
            .map(|row| {
                t.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), Value::String(v.clone())))
                    .collect()
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let inner = self.lock();
        let t = inner.tables.get(table).ok_or_else(|| missing_table(table))?;
        Ok(t.committed.len() as u64)
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.lock().tables.remove(table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeclaredType;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("code", DeclaredType::VarChar(20)).primary_key(),
            ColumnSpec::new("product_name", DeclaredType::Text),
        ]
    }

    fn row(code: &str, name: &str) -> Row {
        vec![code.to_string(), name.to_string()]
    }

    fn names() -> Vec<String> {
        vec!["code".to_string(), "product_name".to_string()]
    }

    #[tokio::test]
    async fn test_rows_stay_pending_until_commit() {
        let mut store = MemoryStore::new();
        store.create_table("eanref", &columns()).await.unwrap();

        let inserted = store
            .insert_ignore_batch("eanref", &names(), &[row("1", "a"), row("2", "b")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert!(store.rows("eanref").is_empty());
        assert_eq!(store.pending_rows("eanref").len(), 2);

        store.commit().await.unwrap();
        assert_eq!(store.rows("eanref").len(), 2);
        assert!(store.pending_rows("eanref").is_empty());
    }

    #[tokio::test]
    async fn test_rollback_discards_pending() {
        let mut store = MemoryStore::new();
        store.create_table("eanref", &columns()).await.unwrap();
        store
            .insert_ignore_batch("eanref", &names(), &[row("1", "a")])
            .await
            .unwrap();
        store.rollback().await.unwrap();
        store.commit().await.unwrap();
        assert!(store.rows("eanref").is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_keys_ignored_within_and_across_calls() {
        let mut store = MemoryStore::new();
        store.create_table("eanref", &columns()).await.unwrap();

        let inserted = store
            .insert_ignore_batch("eanref", &names(), &[row("1", "a"), row("1", "b")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        store.commit().await.unwrap();

        let inserted = store
            .insert_ignore_batch("eanref", &names(), &[row("1", "c"), row("2", "d")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        store.commit().await.unwrap();

        assert_eq!(store.rows("eanref"), vec![row("1", "a"), row("2", "d")]);
    }

    #[tokio::test]
    async fn test_insert_maps_columns_by_name() {
        let mut store = MemoryStore::new();
        store.create_table("eanref", &columns()).await.unwrap();
        let reversed = vec!["product_name".to_string(), "code".to_string()];
        store
            .insert_ignore_batch("eanref", &reversed, &[row("Apple", "001")])
            .await
            .unwrap();
        store.commit().await.unwrap();
        assert_eq!(store.rows("eanref"), vec![row("001", "Apple")]);
    }

    #[tokio::test]
    async fn test_injected_failure_counts_the_call() {
        let mut store = MemoryStore::new();
        store.create_table("eanref", &columns()).await.unwrap();
        store.fail_on_insert(1);

        let err = store
            .insert_ignore_batch("eanref", &names(), &[row("1", "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Pool { .. }));
        assert_eq!(store.stats().insert_calls, 1);
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_create_existing_table_fails() {
        let mut store = MemoryStore::new();
        store.seed_table("eanref", columns(), vec![]);
        let err = store.create_table("eanref", &columns()).await.unwrap_err();
        assert!(matches!(err, StoreError::TableExists(_)));
    }

    #[tokio::test]
    async fn test_lookup_semantics() {
        let store = MemoryStore::new();
        store.seed_table("eanref", columns(), vec![row("001", "Apple")]);

        assert_eq!(
            store.lookup("eanref", "product_name", "code", "001").await.unwrap(),
            Some("Apple".to_string())
        );
        assert_eq!(store.lookup("eanref", "product_name", "code", "999").await.unwrap(), None);
        assert_eq!(store.lookup("nope", "product_name", "code", "001").await.unwrap(), None);
        assert!(store.lookup("eanref", "missing", "code", "001").await.is_err());
    }

    #[tokio::test]
    async fn test_table_rows_and_drop() {
        let store = MemoryStore::new();
        store.seed_table("eanref", columns(), vec![row("001", "Apple")]);

        let rows = store.table_rows("eanref").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["code"], "001");
        assert_eq!(rows[0]["product_name"], "Apple");
        assert_eq!(store.row_count("eanref").await.unwrap(), 1);

        store.drop_table("eanref").await.unwrap();
        assert!(store.list_tables().await.unwrap().is_empty());
        assert!(matches!(
            store.table_rows("eanref").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
