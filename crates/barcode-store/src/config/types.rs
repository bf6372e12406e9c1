//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::ColumnSpec;
use crate::error::Result;

/// Default rows buffered per transactional flush.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MySQL connection settings.
    pub database: DatabaseConfig,

    /// Bulk import settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportConfig>,

    /// Lookup API settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// MySQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: disable).
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Create the database on connect when it does not exist (default: true).
    #[serde(default = "default_true")]
    pub create_database: bool,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("create_database", &self.create_database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Bulk import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Tab-delimited input file. May be supplied on the command line instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Table to create and populate.
    pub table: String,

    /// Rows buffered per transactional flush (default: 10000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Wanted columns, in order: header name -> declared type.
    pub columns: ColumnMap,
}

impl ImportConfig {
    /// Parse the configured columns into validated specs.
    pub fn column_specs(&self) -> Result<Vec<ColumnSpec>> {
        ColumnSpec::parse_all(self.columns.iter())
    }
}

/// Lookup API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0).
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// Bind port (default: 5000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Reference product table filled by imports (default: eanref).
    #[serde(default = "default_reference_table")]
    pub reference_table: String,

    /// Barcode column of the reference table (default: code).
    #[serde(default = "default_reference_key_column")]
    pub reference_key_column: String,

    /// Product name column of the reference table (default: product_name).
    #[serde(default = "default_reference_name_column")]
    pub reference_name_column: String,

    /// Table listing the stores (default: stores).
    #[serde(default = "default_stores_table")]
    pub stores_table: String,

    /// Prefix of per-store approved item tables (default: store_).
    #[serde(default = "default_store_table_prefix")]
    pub store_table_prefix: String,

    /// Barcode column of a store table (default: Barcode).
    #[serde(default = "default_store_key_column")]
    pub store_key_column: String,

    /// Item name column of a store table (default: Name).
    #[serde(default = "default_store_name_column")]
    pub store_name_column: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_server_port(),
            reference_table: default_reference_table(),
            reference_key_column: default_reference_key_column(),
            reference_name_column: default_reference_name_column(),
            stores_table: default_stores_table(),
            store_table_prefix: default_store_table_prefix(),
            store_key_column: default_store_key_column(),
            store_name_column: default_store_name_column(),
        }
    }
}

impl ServerConfig {
    /// Table holding the approved items of one store.
    pub fn store_table(&self, store_id: &str) -> String {
        format!("{}{}", self.store_table_prefix, store_id)
    }
}

/// Ordered `column name -> declared type` mapping.
///
/// Deserialized from a YAML mapping with document order preserved, which a
/// hash map would lose. Duplicate names are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap(Vec<(String, String)>);

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing the type of an existing entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, declared: impl Into<String>) {
        let name = name.into();
        let declared = declared.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = declared,
            None => self.0.push((name, declared)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (name, declared) in iter {
            map.insert(name, declared);
        }
        map
    }
}

impl Serialize for ColumnMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, declared) in &self.0 {
            map.serialize_entry(name, declared)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ColumnMapVisitor;

        impl<'de> Visitor<'de> for ColumnMapVisitor {
            type Value = ColumnMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of column name to declared type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<ColumnMap, A::Error> {
                let mut entries: Vec<(String, String)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, declared)) = access.next_entry::<String, String>()? {
                    if entries.iter().any(|(n, _)| *n == name) {
                        return Err(serde::de::Error::custom(format!(
                            "column '{}' is configured more than once",
                            name
                        )));
                    }
                    entries.push((name, declared));
                }
                Ok(ColumnMap(entries))
            }
        }

        deserializer.deserialize_map(ColumnMapVisitor)
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> usize {
    4
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

fn default_reference_table() -> String {
    "eanref".to_string()
}

fn default_reference_key_column() -> String {
    "code".to_string()
}

fn default_reference_name_column() -> String {
    "product_name".to_string()
}

fn default_stores_table() -> String {
    "stores".to_string()
}

fn default_store_table_prefix() -> String {
    "store_".to_string()
}

fn default_store_key_column() -> String {
    "Barcode".to_string()
}

fn default_store_name_column() -> String {
    "Name".to_string()
}
