//! Bulk ingestion of a tab-delimited file into a new table.
//!
//! One forward pass over the input:
//!
//! 1. Create the target table from the configured columns, refusing to touch
//!    a table that already exists.
//! 2. Read the header record and resolve every configured column to a file
//!    position.
//! 3. For each data record, extract the wanted fields, clamp them to their
//!    declared width, and buffer the row. Full buffers are written with a
//!    duplicate-tolerant insert and committed on their own.
//! 4. Flush the final partial buffer.
//!
//! Memory is bounded by the batch size, not the input size. There is no
//! transaction spanning the whole file: when a flush fails, every earlier
//! batch stays committed and the error carries the partial counts.
//!
//! Imports of the same table must be serialized by the caller; nothing here
//! locks the table.

mod batch;
pub mod header;
pub mod truncate;

pub use batch::BatchAccumulator;
pub use header::{ExtractionPlan, HeaderIndex, RowDefect};
pub use truncate::{truncate, Truncator};

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use csv::ByteRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ImportConfig, DEFAULT_BATCH_SIZE};
use crate::core::schema::validate_columns;
use crate::core::{ColumnSpec, TableStore};
use crate::error::{Result, StoreError};

/// Settings for one import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub batch_size: usize,
}

impl ImportOptions {
    /// Validate a table name and column list, with the default batch size.
    pub fn new(table: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self> {
        let table = table.into();
        crate::core::identifier::validate_identifier(&table)?;
        validate_columns(&columns)?;
        Ok(Self {
            table,
            columns,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(StoreError::Config("batch size must be at least 1".into()));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    /// Build options from the `import` config section.
    pub fn from_config(config: &ImportConfig) -> Result<Self> {
        Self::new(config.table.clone(), config.column_specs()?)?.with_batch_size(config.batch_size)
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Where an import is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportPhase {
    Init,
    SchemaCreated,
    HeaderResolved,
    Streaming,
    Done,
    Aborted,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Init => "init",
            ImportPhase::SchemaCreated => "schema-created",
            ImportPhase::HeaderResolved => "header-resolved",
            ImportPhase::Streaming => "streaming",
            ImportPhase::Done => "done",
            ImportPhase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Target table.
    pub table: String,

    /// Well-formed data rows queued for insertion, including rows the store
    /// later dropped as primary key duplicates.
    pub rows_accepted: u64,

    /// Malformed data rows that were skipped.
    pub rows_skipped: u64,

    /// Rows the store reported as newly inserted.
    pub rows_inserted: u64,

    /// Individual values shortened to their declared width.
    pub fields_truncated: u64,

    /// Batches written and committed.
    pub batches_flushed: u64,

    /// When the import started.
    pub started_at: DateTime<Utc>,

    /// When the import finished.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl ImportResult {
    pub fn new(table: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            table: table.into(),
            rows_accepted: 0,
            rows_skipped: 0,
            rows_inserted: 0,
            fields_truncated: 0,
            batches_flushed: 0,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
        }
    }

    /// Primary key duplicates the store ignored.
    pub fn duplicates_ignored(&self) -> u64 {
        self.rows_accepted.saturating_sub(self.rows_inserted)
    }

    /// Serialize result to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn finish(&mut self, started: Instant) {
        self.completed_at = Utc::now();
        self.duration_seconds = started.elapsed().as_secs_f64();
    }
}

/// Drives one import against an explicitly supplied store.
pub struct Importer<'s, S: TableStore + ?Sized> {
    store: &'s mut S,
    options: ImportOptions,
    phase: ImportPhase,
}

impl<'s, S: TableStore + ?Sized> Importer<'s, S> {
    pub fn new(store: &'s mut S, options: ImportOptions) -> Self {
        Self {
            store,
            options,
            phase: ImportPhase::Init,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    /// Import a file. A missing file fails before any store call.
    pub async fn run_file(&mut self, path: impl AsRef<Path>) -> Result<ImportResult> {
        let path = path.as_ref();
        if !path.exists() {
            self.transition(ImportPhase::Aborted);
            return Err(StoreError::InputNotFound(path.to_path_buf()));
        }
        info!("Importing '{}' into table '{}'", path.display(), self.options.table);
        let file = File::open(path)?;
        self.run_reader(file).await
    }

    /// Import from any byte stream.
    pub async fn run_reader<R: Read + Send>(&mut self, input: R) -> Result<ImportResult> {
        let outcome = self.run_inner(input).await;
        if outcome.is_err() {
            self.transition(ImportPhase::Aborted);
        }
        outcome
    }

    async fn run_inner<R: Read + Send>(&mut self, input: R) -> Result<ImportResult> {
        let started = Instant::now();
        let mut result = ImportResult::new(&self.options.table);

        info!(
            "Starting import into '{}' ({} columns, batch size {})",
            self.options.table,
            self.options.columns.len(),
            self.options.batch_size
        );

        self.create_schema().await?;
        self.transition(ImportPhase::SchemaCreated);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let (_header, plan) = header::resolve(&mut reader, &self.options.columns)?;
        self.transition(ImportPhase::HeaderResolved);

        let truncator = Truncator::new(&self.options.columns);
        let table = self.options.table.clone();
        let mut batch = BatchAccumulator::new(
            &mut *self.store,
            table.clone(),
            self.options.column_names(),
            self.options.batch_size,
        );
        self.phase = ImportPhase::Streaming;
        debug!("Import phase -> {}", self.phase);

        let mut record = ByteRecord::new();
        let mut row_number: u64 = 1;
        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(read_error(row_number + 1, &batch, result, e)),
            }
            row_number += 1;

            let fields = match plan.extract(&record) {
                Ok(fields) => fields,
                Err(defect) => {
                    warn!("Skipping malformed row {}: {}", row_number, defect);
                    result.rows_skipped += 1;
                    continue;
                }
            };

            let (row, truncated) = truncator.apply(row_number, &fields);
            result.fields_truncated += truncated;
            result.rows_accepted += 1;

            let before = batch.flushes();
            if let Err(e) = batch.add(row).await {
                return Err(flush_error(&table, &batch, result, e));
            }
            if batch.flushes() > before {
                info!(
                    "  ... {} rows accepted into {} ({} batches committed)",
                    result.rows_accepted,
                    table,
                    batch.flushes()
                );
            }
        }

        if let Err(e) = batch.flush().await {
            return Err(flush_error(&table, &batch, result, e));
        }

        result.batches_flushed = batch.flushes();
        result.rows_inserted = batch.rows_inserted();
        result.finish(started);
        self.transition(ImportPhase::Done);

        info!(
            "Imported {} rows into '{}' ({} skipped, {} duplicates ignored, {} values truncated) in {:.2}s",
            result.rows_accepted,
            result.table,
            result.rows_skipped,
            result.duplicates_ignored(),
            result.fields_truncated,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Create the target table, failing if it already exists.
    async fn create_schema(&mut self) -> Result<()> {
        let table = &self.options.table;
        if self.store.table_exists(table).await? {
            return Err(StoreError::TableExists(table.clone()));
        }
        info!("Table '{}' not found. Creating it...", table);
        self.store.create_table(table, &self.options.columns).await
    }

    fn transition(&mut self, next: ImportPhase) {
        debug!("Import phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}

fn read_error<S: TableStore + ?Sized>(
    row: u64,
    batch: &BatchAccumulator<'_, S>,
    mut partial: ImportResult,
    source: csv::Error,
) -> StoreError {
    partial.batches_flushed = batch.flushes();
    partial.rows_inserted = batch.rows_inserted();
    partial.completed_at = Utc::now();
    StoreError::Read {
        row,
        message: source.to_string(),
        partial: Some(partial),
    }
}

fn flush_error<S: TableStore + ?Sized>(
    table: &str,
    batch: &BatchAccumulator<'_, S>,
    mut partial: ImportResult,
    source: StoreError,
) -> StoreError {
    partial.batches_flushed = batch.flushes();
    partial.rows_inserted = batch.rows_inserted();
    partial.completed_at = Utc::now();
    StoreError::Flush {
        table: table.to_string(),
        batch: batch.flushes() + 1,
        partial,
        source: Box::new(source),
    }
}
