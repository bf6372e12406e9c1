//! MySQL/MariaDB driver.
//!
//! - [`MysqlStore`]: pooled lookups and table administration
//! - [`MysqlSession`]: one connection with autocommit off, used by an import
//!
//! Tables are created on InnoDB with `utf8mb4`, so committed batches survive
//! a later failure and the full Unicode range round-trips.

pub mod dialect;
mod store;

pub use store::{MysqlSession, MysqlStore};
