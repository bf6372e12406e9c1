//! Bounded row buffer flushed through a duplicate-tolerant insert.

use tracing::{debug, error};

use crate::core::{Row, TableStore};
use crate::error::Result;

/// Buffers rows for one table and writes them in committed batches.
///
/// Each flush is one `insert_ignore_batch` followed by `commit`. A failed
/// flush rolls back the pending transaction and returns the store error;
/// batches committed earlier are left in place.
pub struct BatchAccumulator<'s, S: TableStore + ?Sized> {
    store: &'s mut S,
    table: String,
    columns: Vec<String>,
    capacity: usize,
    rows: Vec<Row>,
    flushes: u64,
    rows_inserted: u64,
}

impl<'s, S: TableStore + ?Sized> BatchAccumulator<'s, S> {
    /// Create an empty accumulator. A capacity of zero is treated as one.
    pub fn new(store: &'s mut S, table: impl Into<String>, columns: Vec<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            table: table.into(),
            columns,
            capacity,
            rows: Vec::with_capacity(capacity),
            flushes: 0,
            rows_inserted: 0,
        }
    }

    /// Append a row, flushing when the buffer reaches capacity.
    pub async fn add(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        if self.rows.len() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write and commit whatever is buffered. An empty buffer is a no-op.
    pub async fn flush(&mut self) -> Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }

        let batch_no = self.flushes + 1;
        let written = self.write().await;
        let inserted = match written {
            Ok(inserted) => inserted,
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback().await {
                    error!(
                        "Rollback after failed batch {} on {} also failed: {}",
                        batch_no, self.table, rollback_err
                    );
                }
                return Err(e);
            }
        };

        debug!(
            "Flushed batch {} into {}: {} rows, {} inserted",
            batch_no,
            self.table,
            self.rows.len(),
            inserted
        );

        self.flushes = batch_no;
        self.rows_inserted += inserted;
        self.rows.clear();
        Ok(())
    }

    async fn write(&mut self) -> Result<u64> {
        let inserted = self
            .store
            .insert_ignore_batch(&self.table, &self.columns, &self.rows)
            .await?;
        self.store.commit().await?;
        Ok(inserted)
    }

    /// Rows currently buffered.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of committed flushes.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Rows the store reported as newly inserted, summed over all flushes.
    pub fn rows_inserted(&self) -> u64 {
        self.rows_inserted
    }
}
