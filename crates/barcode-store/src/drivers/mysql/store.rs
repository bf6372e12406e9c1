//! MySQL store built on mysql_async.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, Value};
use serde_json::Map;
use tracing::{debug, info, warn};

use super::dialect;
use crate::config::DatabaseConfig;
use crate::core::{ColumnSpec, LookupStore, Row, TableStore};
use crate::error::{Result, StoreError};

/// Pooled MySQL access for lookups, plus transactional sessions for imports.
pub struct MysqlStore {
    pool: Pool,
    database: String,
}

impl MysqlStore {
    /// Connect to the configured database, creating it first when
    /// `create_database` is set.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.create_database {
            ensure_database(config).await?;
        }

        let constraints = PoolConstraints::new(1, config.max_connections).ok_or_else(|| {
            StoreError::Config(format!(
                "invalid max_connections: {}",
                config.max_connections
            ))
        })?;
        let opts: Opts = base_opts(config)
            .db_name(Some(&config.database))
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        // Test connection
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| StoreError::pool(e, "creating MySQL pool"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| StoreError::pool(e, "testing MySQL connection"))?;
        drop(conn);

        info!(
            "Connected to MySQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Take a dedicated connection with autocommit off, for one import.
    pub async fn session(&self) -> Result<MysqlSession> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| StoreError::pool(e, "opening import session"))?;
        conn.query_drop("SET autocommit = 0").await?;
        Ok(MysqlSession {
            conn,
            database: self.database.clone(),
        })
    }

    /// Round-trip a trivial query and report the server version.
    pub async fn health_check(&self) -> Result<String> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| StoreError::pool(e, "health check"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| StoreError::pool(e, "health check"))?;
        let (major, minor, patch) = conn.server_version();
        Ok(format!("{}.{}.{}", major, minor, patch))
    }

    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }

    async fn conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| StoreError::pool(e, "getting MySQL connection"))
    }
}

fn base_opts(config: &DatabaseConfig) -> OptsBuilder {
    let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
        "disable" => {
            debug!("MySQL TLS is disabled");
            None
        }
        "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
        "verify-ca" | "verify_ca" | "verify-full" | "verify_identity" => Some(SslOpts::default()),
        other => {
            warn!("Unknown ssl_mode '{}', defaulting to prefer", other);
            Some(SslOpts::default().with_danger_accept_invalid_certs(true))
        }
    };

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(&config.host)
        .tcp_port(config.port)
        .user(Some(&config.user))
        .pass(Some(&config.password))
        .init(vec!["SET NAMES utf8mb4"]);
    if let Some(ssl) = ssl_opts {
        builder = builder.ssl_opts(ssl);
    }
    builder
}

async fn ensure_database(config: &DatabaseConfig) -> Result<()> {
    let mut conn = Conn::new(base_opts(config))
        .await
        .map_err(|e| StoreError::pool(e, "connecting to MySQL server"))?;
    conn.query_drop(dialect::create_database_sql(&config.database)?)
        .await?;
    debug!("Ensured database '{}' exists", config.database);
    conn.disconnect().await?;
    Ok(())
}

async fn table_exists_on(conn: &mut Conn, database: &str, table: &str) -> Result<bool> {
    let count: Option<i64> = conn
        .exec_first(dialect::TABLE_EXISTS_SQL, (database, table))
        .await
        .map_err(|e| StoreError::pool(e, "checking table existence"))?;
    Ok(count.unwrap_or(0) > 0)
}

/// Render a MySQL value as text, `None` for NULL.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(y, mo, d, h, mi, s, us) => Some(if *us > 0 {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}", y, mo, d, h, mi, s, us)
        } else {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, mo, d, h, mi, s)
        }),
        Value::Time(neg, days, h, mi, s, _us) => {
            let hours = *days * 24 + u32::from(*h);
            Some(format!(
                "{}{:02}:{:02}:{:02}",
                if *neg { "-" } else { "" },
                hours,
                mi,
                s
            ))
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NULL => serde_json::Value::Null,
        Value::Int(i) => (*i).into(),
        Value::UInt(u) => (*u).into(),
        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        other => value_to_string(other)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[async_trait]
impl LookupStore for MysqlStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let names: Vec<String> = conn
            .exec(dialect::LIST_TABLES_SQL, (self.database.as_str(),))
            .await?;
        Ok(names)
    }

    async fn lookup(
        &self,
        table: &str,
        value_column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let sql = dialect::lookup_sql(table, value_column, key_column)?;
        let mut conn = self.conn().await?;
        if !table_exists_on(&mut conn, &self.database, table).await? {
            return Ok(None);
        }
        let row: Option<mysql_async::Row> = conn.exec_first(sql, (key,)).await?;
        Ok(row.and_then(|r| r.as_ref(0).and_then(value_to_string)))
    }

    async fn table_rows(&self, table: &str) -> Result<Vec<Map<String, serde_json::Value>>> {
        let sql = dialect::select_all_sql(table)?;
        let mut conn = self.conn().await?;
        if !table_exists_on(&mut conn, &self.database, table).await? {
            return Err(StoreError::NotFound(format!("table '{}'", table)));
        }
        let rows: Vec<mysql_async::Row> = conn.query(sql).await?;
        Ok(rows
            .iter()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| {
                        let value = row.as_ref(i).map(value_to_json).unwrap_or_default();
                        (col.name_str().into_owned(), value)
                    })
                    .collect()
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = dialect::count_sql(table)?;
        let mut conn = self.conn().await?;
        if !table_exists_on(&mut conn, &self.database, table).await? {
            return Err(StoreError::NotFound(format!("table '{}'", table)));
        }
        let count: Option<u64> = conn.query_first(sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let sql = dialect::drop_table_sql(table)?;
        let mut conn = self.conn().await?;
        conn.query_drop(sql).await?;
        info!("Dropped table '{}'", table);
        Ok(())
    }
}

/// One connection with an open transaction, used by a single import.
pub struct MysqlSession {
    conn: Conn,
    database: String,
}

impl MysqlSession {
    /// Return the connection to the server.
    pub async fn close(self) -> Result<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl TableStore for MysqlSession {
    async fn table_exists(&mut self, table: &str) -> Result<bool> {
        table_exists_on(&mut self.conn, &self.database, table).await
    }

    async fn create_table(&mut self, table: &str, columns: &[ColumnSpec]) -> Result<()> {
        let ddl = dialect::create_table_sql(table, columns)?;
        debug!("{}", ddl);
        self.conn.query_drop(ddl).await?;
        Ok(())
    }

    async fn insert_ignore_batch(
        &mut self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        if rows.is_empty() || columns.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0;
        for chunk in rows.chunks(dialect::rows_per_statement(columns.len())) {
            let sql = dialect::insert_ignore_sql(table, columns, chunk.len())?;
            let params: Vec<Value> = chunk
                .iter()
                .flat_map(|row| row.iter().map(|v| Value::Bytes(v.as_bytes().to_vec())))
                .collect();
            if params.len() != chunk.len() * columns.len() {
                return Err(StoreError::Config(format!(
                    "row width does not match {} columns for {}",
                    columns.len(),
                    table
                )));
            }
            self.conn.exec_drop(sql, params).await?;
            inserted += self.conn.affected_rows();
        }
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await?;
        Ok(())
    }
}
