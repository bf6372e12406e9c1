//! Header resolution and positional field extraction.

use std::collections::HashMap;
use std::io::Read;

use csv::ByteRecord;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::ColumnSpec;
use crate::error::{Result, StoreError};

/// Column name -> zero-based position, built from the first input record.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    /// Build the index from a header record. Names are trimmed; when a name
    /// repeats, its first position wins.
    pub fn from_record(record: &ByteRecord) -> Self {
        let mut positions = HashMap::with_capacity(record.len());
        for (i, field) in record.iter().enumerate() {
            let name = String::from_utf8_lossy(field).trim().to_string();
            positions.entry(name).or_insert(i);
        }
        Self {
            positions,
            width: record.len(),
        }
    }

    /// Number of fields in the header, which every data record must match.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Resolve each wanted column to its position, in column order.
    ///
    /// Fails on the first column the header does not contain.
    pub fn plan(&self, columns: &[ColumnSpec]) -> Result<ExtractionPlan> {
        let ordinals = columns
            .iter()
            .map(|col| {
                self.position(&col.name)
                    .ok_or_else(|| StoreError::MissingColumn(col.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExtractionPlan {
            ordinals,
            width: self.width,
        })
    }
}

/// Why a data record could not be extracted. Always a per-row skip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowDefect {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("column index {ordinal} out of range")]
    OutOfRange { ordinal: usize },

    #[error("field {ordinal} is not valid UTF-8")]
    InvalidUtf8 { ordinal: usize },
}

/// Positions of the wanted columns within each data record, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    ordinals: Vec<usize>,
    width: usize,
}

impl ExtractionPlan {
    pub fn ordinals(&self) -> &[usize] {
        &self.ordinals
    }

    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Pull the wanted fields out of a record, in column order.
    pub fn extract<'r>(&self, record: &'r ByteRecord) -> std::result::Result<Vec<&'r str>, RowDefect> {
        if record.len() != self.width {
            return Err(RowDefect::FieldCount {
                expected: self.width,
                found: record.len(),
            });
        }

        self.ordinals
            .iter()
            .map(|&ordinal| {
                let bytes = record
                    .get(ordinal)
                    .ok_or(RowDefect::OutOfRange { ordinal })?;
                std::str::from_utf8(bytes).map_err(|_| RowDefect::InvalidUtf8 { ordinal })
            })
            .collect()
    }
}

/// Read the header record and resolve the wanted columns against it.
///
/// An input with no records at all is [`StoreError::EmptyInput`], distinct
/// from a header that lacks a column.
pub fn resolve<R: Read>(
    reader: &mut csv::Reader<R>,
    columns: &[ColumnSpec],
) -> Result<(HeaderIndex, ExtractionPlan)> {
    let mut record = ByteRecord::new();
    let found = reader
        .read_byte_record(&mut record)
        .map_err(|e| StoreError::read(1, e))?;
    if !found {
        return Err(StoreError::EmptyInput);
    }

    let header = HeaderIndex::from_record(&record);
    debug!("Header has {} columns", header.width());

    let plan = header.plan(columns)?;
    info!(
        "Importing columns {:?} from file positions {:?}",
        columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        plan.ordinals()
    );

    Ok((header, plan))
}
