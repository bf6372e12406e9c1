//! Core abstractions shared by the ingestion engine, the store drivers, and
//! the lookup facade.
//!
//! - [`schema`]: declared column types and the column list of an import
//! - [`identifier`]: identifier validation and MySQL quoting
//! - [`traits`]: the store contracts implemented by `drivers`

pub mod identifier;
pub mod schema;
pub mod traits;

pub use schema::{ColumnSpec, DeclaredType};
pub use traits::{table_summaries, LookupStore, Row, TableStore, TableSummary};
