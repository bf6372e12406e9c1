//! HTTP lookup API over a [`LookupStore`](crate::core::LookupStore).
//!
//! Answers barcode coverage questions against per-store approval tables and
//! the bulk-loaded reference table.

mod commands;
mod routes;

pub use commands::handle_command;
pub use routes::{build_router, serve, AppState};
