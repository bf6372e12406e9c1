//! Value truncation to the declared column width.
//!
//! `VARCHAR(n)` is clamped by characters. `TEXT` and `MEDIUMTEXT` are clamped
//! by UTF-8 bytes, backing off to the previous character boundary so the kept
//! prefix is always valid text. Truncation never rejects a value.

use tracing::debug;

use crate::core::schema::{MEDIUMTEXT_MAX_BYTES, TEXT_MAX_BYTES};
use crate::core::{ColumnSpec, DeclaredType, Row};

/// Clamp `value` to fit `declared`. Returns a prefix of `value`.
pub fn truncate<'a>(value: &'a str, declared: &DeclaredType) -> &'a str {
    match declared {
        DeclaredType::VarChar(n) => truncate_chars(value, *n as usize),
        DeclaredType::Text => truncate_bytes(value, TEXT_MAX_BYTES),
        DeclaredType::MediumText => truncate_bytes(value, MEDIUMTEXT_MAX_BYTES),
    }
}

/// Keep at most `max_chars` characters.
fn truncate_chars(value: &str, max_chars: usize) -> &str {
    // A string of n bytes has at most n chars.
    if value.len() <= max_chars {
        return value;
    }
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

/// Keep at most `max_bytes` bytes, dropping a trailing partial character.
fn truncate_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Applies each column's truncation policy to an extracted row.
#[derive(Debug, Clone)]
pub struct Truncator {
    columns: Vec<(String, DeclaredType)>,
}

impl Truncator {
    pub fn new(columns: &[ColumnSpec]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| (c.name.clone(), c.declared))
                .collect(),
        }
    }

    /// Build an owned row from extracted fields, clamping each one.
    ///
    /// Returns the row and how many of its fields were shortened.
    pub fn apply(&self, row_number: u64, fields: &[&str]) -> (Row, u64) {
        let mut truncated = 0;
        let row = fields
            .iter()
            .zip(&self.columns)
            .map(|(value, (name, declared))| {
                let kept = truncate(value, declared);
                if kept.len() != value.len() {
                    truncated += 1;
                    debug!(
                        "Row {}: truncated '{}' from {} to {} bytes to fit {}",
                        row_number,
                        name,
                        value.len(),
                        kept.len(),
                        declared
                    );
                }
                kept.to_string()
            })
            .collect();
        (row, truncated)
    }
}
