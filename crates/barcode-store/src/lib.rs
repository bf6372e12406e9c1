//! # barcode-store
//!
//! Bulk ingestion of large tab-delimited product dumps into MySQL, plus a
//! small HTTP API answering barcode lookups against the loaded data.
//!
//! - **Streaming import**: one forward pass, memory bounded by the batch size
//! - **Declared-width truncation** of `VARCHAR(n)`, `TEXT` and `MEDIUMTEXT`
//!   values before they reach the database
//! - **Duplicate-tolerant batches**: `INSERT IGNORE`, one commit per batch
//! - **Lookup API** for per-store approval checks with a reference fallback
//!
//! ## Example
//!
//! ```rust,no_run
//! use barcode_store::{Config, Importer, ImportOptions, MysqlStore};
//!
//! #[tokio::main]
//! async fn main() -> barcode_store::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let store = MysqlStore::connect(&config.database).await?;
//!     let mut session = store.session().await?;
//!
//!     let import = config.import.as_ref().expect("import section");
//!     let options = ImportOptions::from_config(import)?;
//!     let result = Importer::new(&mut session, options)
//!         .run_file("products.tsv")
//!         .await?;
//!     println!("Imported {} rows", result.rows_accepted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod ingest;
pub mod server;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, ImportConfig, ServerConfig};
pub use crate::core::{
    table_summaries, ColumnSpec, DeclaredType, LookupStore, Row, TableStore, TableSummary,
};
pub use drivers::{MemoryStore, MysqlSession, MysqlStore};
pub use error::{Result, StoreError};
pub use ingest::{ImportOptions, ImportPhase, ImportResult, Importer};
