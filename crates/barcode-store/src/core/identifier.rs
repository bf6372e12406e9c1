//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table and column names come from configuration and from the header row of
//! the input file, and they cannot be bound as statement parameters. Every
//! identifier rendered into SQL goes through [`quote_mysql`], which validates
//! it and applies backtick quoting with embedded backticks doubled.

use crate::error::{Result, StoreError};

/// Maximum identifier length accepted by MySQL.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers longer than [`MAX_IDENTIFIER_LENGTH`] characters
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(StoreError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    let chars = name.chars().count();
    if chars > MAX_IDENTIFIER_LENGTH {
        return Err(StoreError::Config(format!(
            "Identifier exceeds maximum length of {} characters (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH, chars, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("eanref")?, "`eanref`");
/// assert_eq!(quote_mysql("odd`name")?, "`odd``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("eanref").is_ok());
        assert!(validate_identifier("store_0").is_ok());
        assert!(validate_identifier("product name").is_ok());
        assert!(validate_identifier("código").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
        assert!(validate_identifier("   ").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_is_counted_in_chars() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        assert!(validate_identifier(&"é".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        let result = validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1));
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote_mysql_escapes_backtick() {
        assert_eq!(quote_mysql("eanref").unwrap(), "`eanref`");
        assert_eq!(quote_mysql("odd`name").unwrap(), "`odd``name`");
        assert_eq!(quote_mysql("`").unwrap(), "````");
    }

    #[test]
    fn test_quote_mysql_rejects_invalid() {
        assert!(quote_mysql("").is_err());
        assert!(quote_mysql("a\0b").is_err());
    }
}
