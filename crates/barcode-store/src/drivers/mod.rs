//! Store implementations.

mod memory;
pub mod mysql;

pub use memory::{MemoryStore, StoreStats};
pub use mysql::{MysqlSession, MysqlStore};
