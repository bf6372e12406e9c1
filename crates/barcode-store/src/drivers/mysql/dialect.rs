//! MySQL statement text.
//!
//! Identifiers are validated and backtick-quoted; values are always bound as
//! `?` parameters.

use crate::core::identifier::quote_mysql;
use crate::core::ColumnSpec;
use crate::error::Result;

/// MySQL rejects prepared statements with more placeholders than this.
pub const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

pub const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) AS cnt FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

pub const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME";

/// `CREATE TABLE` with the columns in order, on InnoDB with full Unicode.
pub fn create_table_sql(table: &str, columns: &[ColumnSpec]) -> Result<String> {
    let defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote_mysql(&c.name)?, c.ddl_type())))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE {} ({}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote_mysql(table)?,
        defs.join(", ")
    ))
}

pub fn create_database_sql(database: &str) -> Result<String> {
    Ok(format!(
        "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4",
        quote_mysql(database)?
    ))
}

/// Multi-row `INSERT IGNORE` with `row_count` placeholder groups.
pub fn insert_ignore_sql(table: &str, columns: &[String], row_count: usize) -> Result<String> {
    let cols = columns
        .iter()
        .map(|c| quote_mysql(c))
        .collect::<Result<Vec<_>>>()?;
    let group = format!("({})", vec!["?"; columns.len()].join(", "));
    let values = vec![group; row_count].join(", ");
    Ok(format!(
        "INSERT IGNORE INTO {} ({}) VALUES {}",
        quote_mysql(table)?,
        cols.join(", "),
        values
    ))
}

/// Rows that fit in one statement without exceeding the placeholder limit.
pub fn rows_per_statement(num_columns: usize) -> usize {
    (MYSQL_MAX_PLACEHOLDERS / num_columns.max(1)).max(1)
}

pub fn lookup_sql(table: &str, value_column: &str, key_column: &str) -> Result<String> {
    Ok(format!(
        "SELECT {} FROM {} WHERE {} = ? LIMIT 1",
        quote_mysql(value_column)?,
        quote_mysql(table)?,
        quote_mysql(key_column)?
    ))
}

pub fn select_all_sql(table: &str) -> Result<String> {
    Ok(format!("SELECT * FROM {}", quote_mysql(table)?))
}

pub fn count_sql(table: &str) -> Result<String> {
    Ok(format!("SELECT COUNT(*) AS cnt FROM {}", quote_mysql(table)?))
}

pub fn drop_table_sql(table: &str) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_mysql(table)?))
}
