//! Column specifications and declared storage types.
//!
//! The caller describes the wanted columns as an ordered list of
//! `name -> declared type` pairs. That list is both the table definition and
//! the set of columns extracted from the input, so everything about it is
//! validated here, before any file or database is touched.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::identifier::validate_identifier;
use crate::error::{Result, StoreError};

/// Largest value a `TEXT` column can hold, in bytes.
pub const TEXT_MAX_BYTES: usize = 65_535;

/// Largest value a `MEDIUMTEXT` column can hold, in bytes.
pub const MEDIUMTEXT_MAX_BYTES: usize = 16_777_215;

/// Largest `VARCHAR(n)` MySQL accepts in a `utf8mb4` table (65,535 bytes
/// at 4 bytes per character).
pub const VARCHAR_MAX_LENGTH: u32 = 16_383;

/// Storage class assigned to a wanted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeclaredType {
    /// `VARCHAR(n)`: at most `n` characters.
    VarChar(u32),
    /// `TEXT`: at most 65,535 bytes.
    Text,
    /// `MEDIUMTEXT`: at most 16,777,215 bytes.
    MediumText,
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::VarChar(n) => write!(f, "VARCHAR({})", n),
            DeclaredType::Text => f.write_str("TEXT"),
            DeclaredType::MediumText => f.write_str("MEDIUMTEXT"),
        }
    }
}

impl FromStr for DeclaredType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();

        match upper.as_str() {
            "TEXT" => return Ok(DeclaredType::Text),
            "MEDIUMTEXT" => return Ok(DeclaredType::MediumText),
            _ => {}
        }

        let length = upper
            .strip_prefix("VARCHAR")
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix('('))
            .and_then(|rest| rest.strip_suffix(')'))
            .map(str::trim)
            .ok_or_else(|| {
                StoreError::Config(format!(
                    "unsupported column type '{}': expected VARCHAR(n), TEXT or MEDIUMTEXT",
                    s.trim()
                ))
            })?;

        let n: u32 = length.parse().map_err(|_| {
            StoreError::Config(format!("invalid VARCHAR length '{}' in '{}'", length, s.trim()))
        })?;
        if n == 0 || n > VARCHAR_MAX_LENGTH {
            return Err(StoreError::Config(format!(
                "VARCHAR length must be between 1 and {}, got {}",
                VARCHAR_MAX_LENGTH, n
            )));
        }

        Ok(DeclaredType::VarChar(n))
    }
}

/// One wanted column: its name in the input header and in the table, and how
/// it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declared: DeclaredType,
    pub primary_key: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self {
            name: name.into(),
            declared,
            primary_key: false,
        }
    }

    /// Mark this column as the table's primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Parse a `name -> type string` pair.
    ///
    /// The type string is a declared type optionally followed by a primary key
    /// marker, written either `PRIMARY KEY` or `+PrimaryKey`.
    pub fn parse(name: &str, type_str: &str) -> Result<Self> {
        validate_identifier(name)?;

        let normalized = type_str
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace("+ ", "+")
            .replace(" +", "+")
            .to_ascii_uppercase();

        let (base, primary_key) = if let Some(base) = normalized.strip_suffix("+PRIMARYKEY") {
            (base.trim_end(), true)
        } else if let Some(base) = normalized.strip_suffix(" PRIMARY KEY") {
            (base, true)
        } else {
            (normalized.as_str(), false)
        };

        let declared: DeclaredType = base.parse().map_err(|e| match e {
            StoreError::Config(msg) => StoreError::Config(format!("column '{}': {}", name, msg)),
            other => other,
        })?;

        Ok(Self {
            name: name.to_string(),
            declared,
            primary_key,
        })
    }

    /// Parse and validate an ordered column list.
    ///
    /// Requires at least one column, unique names, and at most one primary
    /// key, which must be a `VARCHAR` column (MySQL cannot key an unbounded
    /// text column without a prefix length).
    pub fn parse_all<'a, I>(entries: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let columns = entries
            .into_iter()
            .map(|(name, ty)| Self::parse(name, ty))
            .collect::<Result<Vec<_>>>()?;
        validate_columns(&columns)?;
        Ok(columns)
    }

    /// Column type as rendered in `CREATE TABLE`.
    pub fn ddl_type(&self) -> String {
        if self.primary_key {
            format!("{} PRIMARY KEY", self.declared)
        } else {
            self.declared.to_string()
        }
    }
}

/// Check the invariants of a column list built in code or from config.
pub fn validate_columns(columns: &[ColumnSpec]) -> Result<()> {
    if columns.is_empty() {
        return Err(StoreError::Config(
            "at least one column must be configured".into(),
        ));
    }

    for (i, col) in columns.iter().enumerate() {
        validate_identifier(&col.name)?;
        if columns[..i].iter().any(|c| c.name == col.name) {
            return Err(StoreError::Config(format!(
                "column '{}' is configured more than once",
                col.name
            )));
        }
    }

    let keys: Vec<&ColumnSpec> = columns.iter().filter(|c| c.primary_key).collect();
    if keys.len() > 1 {
        return Err(StoreError::Config(format!(
            "only one primary key column is supported, got {}",
            keys.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        )));
    }
    if let Some(key) = keys.first() {
        if !matches!(key.declared, DeclaredType::VarChar(_)) {
            return Err(StoreError::Config(format!(
                "primary key column '{}' must be VARCHAR(n), got {}",
                key.name, key.declared
            )));
        }
    }

    Ok(())
}

/// Index of the primary key column, if any.
pub fn primary_key_index(columns: &[ColumnSpec]) -> Option<usize> {
    columns.iter().position(|c| c.primary_key)
}
