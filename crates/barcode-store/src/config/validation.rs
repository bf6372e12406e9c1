//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{Result, StoreError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Database validation
    if config.database.host.is_empty() {
        return Err(StoreError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(StoreError::Config("database.database is required".into()));
    }
    validate_identifier(&config.database.database)?;
    if config.database.user.is_empty() {
        return Err(StoreError::Config("database.user is required".into()));
    }
    if config.database.max_connections == 0 {
        return Err(StoreError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }

    // Import validation
    if let Some(import) = &config.import {
        validate_identifier(&import.table)
            .map_err(|e| StoreError::Config(format!("import.table: {}", e)))?;
        if import.batch_size == 0 {
            return Err(StoreError::Config(
                "import.batch_size must be at least 1".into(),
            ));
        }
        import.column_specs()?;
    }

    // Server validation
    let server = &config.server;
    for (field, value) in [
        ("server.reference_table", &server.reference_table),
        ("server.reference_key_column", &server.reference_key_column),
        ("server.reference_name_column", &server.reference_name_column),
        ("server.stores_table", &server.stores_table),
        ("server.store_key_column", &server.store_key_column),
        ("server.store_name_column", &server.store_name_column),
    ] {
        validate_identifier(value).map_err(|e| StoreError::Config(format!("{}: {}", field, e)))?;
    }

    Ok(())
}
