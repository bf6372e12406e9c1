//! Error types for the store and ingestion library.

use std::path::PathBuf;

use thiserror::Error;

use crate::ingest::ImportResult;

/// Main error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Configuration error (invalid YAML, unsupported declared type, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The input file does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// The input stream had no header record
    #[error("Input is empty: no header record found")]
    EmptyInput,

    /// Import target already exists; imports never merge into an existing table
    #[error("Table '{0}' already exists - drop it first if you want to re-import")]
    TableExists(String),

    /// A configured column is absent from the input header
    #[error("Required column '{0}' not found in the input header")]
    MissingColumn(String),

    /// The delimited input could not be read. Once streaming has started,
    /// earlier batches remain committed and `partial` holds their counts.
    #[error("Failed to read input near row {row}: {message}")]
    Read {
        row: u64,
        message: String,
        partial: Option<ImportResult>,
    },

    /// A batch flush failed; earlier batches remain committed
    #[error("Flush of batch {batch} into {table} failed")]
    Flush {
        table: String,
        batch: u64,
        partial: ImportResult,
        #[source]
        source: Box<StoreError>,
    },

    /// MySQL query or protocol error
    #[error("Database error: {0}")]
    Database(#[from] mysql_async::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Lookup of an unknown table or row
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request to the lookup API
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error (file operations, socket binding)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        StoreError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Read error for the given input row
    pub fn read(row: u64, message: impl ToString) -> Self {
        StoreError::Read {
            row,
            message: message.to_string(),
            partial: None,
        }
    }

    /// Rows committed before the failure, for mid-stream aborts.
    pub fn partial_result(&self) -> Option<&ImportResult> {
        match self {
            StoreError::Flush { partial, .. } => Some(partial),
            StoreError::Read { partial, .. } => partial.as_ref(),
            _ => None,
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            StoreError::Config(_) | StoreError::Yaml(_) => 2,
            StoreError::InputNotFound(_)
            | StoreError::EmptyInput
            | StoreError::TableExists(_)
            | StoreError::MissingColumn(_) => 3,
            StoreError::Read { .. } | StoreError::Flush { .. } => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let Some(partial) = self.partial_result() {
            output.push_str(&format!(
                "\nRows accepted before failure: {} (skipped: {}, batches committed: {})",
                partial.rows_accepted, partial.rows_skipped, partial.batches_flushed
            ));
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl axum::response::IntoResponse for StoreError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::Json;

        let status = match &self {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidRequest(_) | StoreError::Json(_) => StatusCode::BAD_REQUEST,
            StoreError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
