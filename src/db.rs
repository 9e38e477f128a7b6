//! Live database handles.
//!
//! [`Database`] is the seam between the pipeline and the relational engine:
//! it combines the catalog provider (schemas, tables, views, columns) with
//! the query executor. [`SqlxDatabase`] implements it once per native `sqlx`
//! driver (SQLite, PostgreSQL, MySQL), so every cell is decoded from the
//! engine's own type information.
//!
//! Handles are opened per request by [`connect`], which refuses to return
//! until the database has answered a trivial query.

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Column, ColumnIndex, Decode, MySql, Pool, Postgres, Row, Sqlite, TypeInfo, ValueRef};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::dialect::Dialect;
use crate::error::{Result, ScoutError};
use crate::models::{CellValue, ColumnInfo, ResultSet};

/// Catalog provider and query executor for one database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Capability table, resolved once when the handle was opened.
    fn dialect(&self) -> Dialect;

    /// Stable identity of the connection, used to derive cache keys.
    fn identity(&self) -> &str;

    /// The schema unqualified names resolve against, if the dialect has one.
    fn default_schema(&self) -> Option<&str>;

    /// Named, user-visible schemas (system schemas excluded).
    async fn list_schemas(&self) -> Result<Vec<String>>;

    /// Base tables in `schema` (`None` = default schema).
    async fn list_tables(&self, schema: Option<&str>) -> Result<BTreeSet<String>>;

    /// Views in `schema`. May fail with [`ScoutError::Unsupported`].
    async fn list_views(&self, schema: Option<&str>) -> Result<BTreeSet<String>>;

    /// Columns of one item in definition order.
    async fn list_columns(&self, schema: Option<&str>, item: &str) -> Result<Vec<ColumnInfo>>;

    /// Run a query and return all rows.
    async fn fetch(&self, sql: &str) -> Result<ResultSet>;

    /// Run a query whose first column of the first row is an integer.
    async fn fetch_scalar(&self, sql: &str) -> Result<i64>;

    /// Release the underlying connections. Handles are request scoped.
    async fn close(&self) {}
}

/// Native-driver [`Database`] over a `sqlx` pool.
///
/// `Database` is implemented for `SqlxDatabase<Sqlite>`,
/// `SqlxDatabase<Postgres>` and `SqlxDatabase<MySql>`.
pub struct SqlxDatabase<DB: sqlx::Database> {
    pool: Pool<DB>,
    dialect: Dialect,
    identity: String,
    default_schema: Option<String>,
    query_timeout: Duration,
}

/// Open and validate a connection.
///
/// Fails with [`ScoutError::Connection`] when the URL names an engine this
/// build has no driver for, the database is unreachable, or it does not
/// answer `SELECT 1`.
pub async fn connect(connection_string: &str, config: &Config) -> Result<Arc<dyn Database>> {
    let connection_string = connection_string.trim();
    if connection_string.is_empty() {
        return Err(ScoutError::BadRequest(
            "connection_string must not be empty".to_string(),
        ));
    }

    let dialect = Dialect::from_url(connection_string);
    let handle: Arc<dyn Database> = match dialect {
        Dialect::Sqlite => {
            let pool = SqlitePoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(query_timeout(config))
                .connect(connection_string)
                .await
                .map_err(|e| ScoutError::Connection(e.to_string()))?;
            Arc::new(SqlxDatabase::<Sqlite>::open(pool, dialect, connection_string, config).await?)
        }
        Dialect::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(query_timeout(config))
                .connect(connection_string)
                .await
                .map_err(|e| ScoutError::Connection(e.to_string()))?;
            Arc::new(
                SqlxDatabase::<Postgres>::open(pool, dialect, connection_string, config).await?,
            )
        }
        Dialect::MySql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(query_timeout(config))
                .connect(connection_string)
                .await
                .map_err(|e| ScoutError::Connection(e.to_string()))?;
            Arc::new(SqlxDatabase::<MySql>::open(pool, dialect, connection_string, config).await?)
        }
        Dialect::MsSql | Dialect::Generic => {
            return Err(ScoutError::Connection(format!(
                "no driver for '{}' connection strings (supported: sqlite, postgres, mysql)",
                connection_string
                    .split_once(':')
                    .map_or(connection_string, |(scheme, _)| scheme)
            )));
        }
    };

    tracing::debug!(dialect = dialect.name(), "connected");
    Ok(handle)
}

fn query_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.database.query_timeout_secs)
}

impl<DB: sqlx::Database> SqlxDatabase<DB> {
    fn schema_or_default<'a>(&'a self, schema: Option<&'a str>) -> Option<&'a str> {
        schema.or(self.default_schema.as_deref())
    }

    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ScoutError::Timeout(
                what.to_string(),
                self.query_timeout.as_secs(),
            )),
        }
    }

    fn schemas_sql(&self) -> &'static str {
        match self.dialect {
            Dialect::Sqlite => {
                "SELECT name FROM pragma_database_list WHERE name <> 'temp' ORDER BY seq"
            }
            Dialect::Postgres => {
                "SELECT schema_name::text FROM information_schema.schemata \
                 WHERE schema_name <> 'information_schema' AND schema_name NOT LIKE 'pg\\_%' \
                 ORDER BY schema_name"
            }
            _ => {
                "SELECT schema_name FROM information_schema.schemata \
                 WHERE schema_name NOT IN ('mysql', 'information_schema', 'performance_schema', 'sys') \
                 ORDER BY schema_name"
            }
        }
    }

    /// Catalog query listing one kind of item, plus its bind parameters.
    ///
    /// `None` when the engine has no schema to look in.
    fn items_query(&self, schema: Option<&str>, views: bool) -> Option<(String, Vec<String>)> {
        if self.dialect == Dialect::Sqlite {
            let schema = self.schema_or_default(schema).unwrap_or("main");
            let sql = format!(
                "SELECT name FROM {}.sqlite_master WHERE type = '{}' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                self.dialect.quote_ident(schema),
                if views { "view" } else { "table" }
            );
            return Some((sql, Vec::new()));
        }

        let schema = self.schema_or_default(schema)?;
        let name_column = match self.dialect {
            Dialect::Postgres => "table_name::text",
            _ => "table_name",
        };
        let sql = format!(
            "SELECT {} FROM information_schema.tables WHERE table_schema = {} AND table_type = '{}' ORDER BY table_name",
            name_column,
            self.dialect.placeholder(1),
            if views { "VIEW" } else { "BASE TABLE" }
        );
        Some((sql, vec![schema.to_string()]))
    }

    /// Column listing query for `item`, plus its bind parameters.
    fn columns_query(&self, schema: Option<&str>, item: &str) -> (&'static str, Vec<String>) {
        let schema = self.schema_or_default(schema);
        match (self.dialect, schema) {
            (Dialect::Sqlite, schema) => (
                "SELECT name, type FROM pragma_table_info(?, ?) ORDER BY cid",
                vec![item.to_string(), schema.unwrap_or("main").to_string()],
            ),
            (Dialect::Postgres, Some(schema)) => (
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
                vec![schema.to_string(), item.to_string()],
            ),
            (Dialect::Postgres, None) => (
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_name = $1 ORDER BY ordinal_position",
                vec![item.to_string()],
            ),
            (_, Some(schema)) => (
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
                vec![schema.to_string(), item.to_string()],
            ),
            (_, None) => (
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_name = ? ORDER BY ordinal_position",
                vec![item.to_string()],
            ),
        }
    }
}

/// `Database` for one concrete driver. The bodies are identical across
/// drivers; only the pool, row and value types differ.
macro_rules! impl_database {
    ($db:ty) => {
        impl SqlxDatabase<$db> {
            async fn open(
                pool: Pool<$db>,
                dialect: Dialect,
                identity: &str,
                config: &Config,
            ) -> Result<Self> {
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .map_err(|e| ScoutError::Connection(e.to_string()))?;

                let default_schema = match dialect {
                    Dialect::MySql => sqlx::query("SELECT DATABASE()")
                        .fetch_one(&pool)
                        .await
                        .and_then(|row| row.try_get_unchecked::<Option<String>, _>(0))
                        .map_err(|e| ScoutError::Connection(e.to_string()))?,
                    other => other.default_schema().map(str::to_string),
                };

                Ok(Self {
                    pool,
                    dialect,
                    identity: identity.to_string(),
                    default_schema,
                    query_timeout: query_timeout(config),
                })
            }

            /// Run a catalog query, binding `params` in order.
            async fn catalog_rows(
                &self,
                what: &str,
                sql: &str,
                params: Vec<String>,
            ) -> Result<Vec<<$db as sqlx::Database>::Row>> {
                self.with_timeout(what, async {
                    let mut query = sqlx::query(sql);
                    for p in params {
                        query = query.bind(p);
                    }
                    query
                        .fetch_all(&self.pool)
                        .await
                        .map_err(|e| ScoutError::Catalog(e.to_string()))
                })
                .await
            }

            async fn fetch_names(&self, sql: &str, params: Vec<String>) -> Result<Vec<String>> {
                let rows = self.catalog_rows("catalog query", sql, params).await?;
                rows.iter()
                    .map(|row| Ok(catalog_text(row, 0)?.unwrap_or_default()))
                    .collect()
            }
        }

        #[async_trait]
        impl Database for SqlxDatabase<$db> {
            fn dialect(&self) -> Dialect {
                self.dialect
            }

            fn identity(&self) -> &str {
                &self.identity
            }

            fn default_schema(&self) -> Option<&str> {
                self.default_schema.as_deref()
            }

            async fn list_schemas(&self) -> Result<Vec<String>> {
                self.fetch_names(self.schemas_sql(), Vec::new()).await
            }

            async fn list_tables(&self, schema: Option<&str>) -> Result<BTreeSet<String>> {
                match self.items_query(schema, false) {
                    Some((sql, params)) => {
                        Ok(self.fetch_names(&sql, params).await?.into_iter().collect())
                    }
                    None => Ok(BTreeSet::new()),
                }
            }

            async fn list_views(&self, schema: Option<&str>) -> Result<BTreeSet<String>> {
                match self.items_query(schema, true) {
                    Some((sql, params)) => {
                        Ok(self.fetch_names(&sql, params).await?.into_iter().collect())
                    }
                    None => Ok(BTreeSet::new()),
                }
            }

            async fn list_columns(
                &self,
                schema: Option<&str>,
                item: &str,
            ) -> Result<Vec<ColumnInfo>> {
                let (sql, params) = self.columns_query(schema, item);
                let rows = self.catalog_rows("column listing", sql, params).await?;
                rows.iter()
                    .map(|row| {
                        Ok(ColumnInfo {
                            name: catalog_text(row, 0)?.unwrap_or_default(),
                            data_type: catalog_text(row, 1)?.unwrap_or_default(),
                        })
                    })
                    .collect()
            }

            async fn fetch(&self, sql: &str) -> Result<ResultSet> {
                // Unprepared statements come back in the text protocol, which
                // every column type can be read from.
                let rows = self
                    .with_timeout("query", async {
                        sqlx::raw_sql(sql)
                            .fetch_all(&self.pool)
                            .await
                            .map_err(|e| ScoutError::execution(sql, e))
                    })
                    .await?;

                let columns = rows
                    .first()
                    .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
                    .unwrap_or_default();

                let rows = rows
                    .iter()
                    .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect())
                    .collect();

                Ok(ResultSet { columns, rows })
            }

            async fn fetch_scalar(&self, sql: &str) -> Result<i64> {
                self.with_timeout("query", async {
                    let row = sqlx::raw_sql(sql)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(|e| ScoutError::execution(sql, e))?;
                    row.try_get_unchecked::<i64, _>(0)
                        .map_err(|e| ScoutError::execution(sql, e))
                })
                .await
            }

            async fn close(&self) {
                self.pool.close().await;
            }
        }
    };
}

impl_database!(Sqlite);
impl_database!(Postgres);
impl_database!(MySql);

/// Read a catalog name as text.
///
/// MySQL 8 reports some `information_schema` columns with a binary
/// collation, so the type check is skipped; the bytes are still UTF-8.
fn catalog_text<R>(row: &R, idx: usize) -> Result<Option<String>>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
{
    row.try_get_unchecked::<Option<String>, _>(idx)
        .map_err(|e| ScoutError::Catalog(e.to_string()))
}

/// How a column's native type is represented in a [`CellValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NativeClass {
    Int,
    Float,
    Bool,
    Bytes,
    /// Everything else (decimals, temporal types, uuid, json, text) keeps
    /// the engine's own text rendering.
    Text,
}

impl NativeClass {
    /// Classify by the driver's type name. SQLite reports the storage class
    /// of each value; PostgreSQL and MySQL report the column type.
    fn of(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        match upper.as_str() {
            "INTEGER" | "INT" | "INT2" | "INT4" | "INT8" | "SMALLINT" | "BIGINT" | "TINYINT"
            | "MEDIUMINT" | "YEAR" | "TINYINT UNSIGNED" | "SMALLINT UNSIGNED"
            | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "BIGINT UNSIGNED" => NativeClass::Int,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" => NativeClass::Float,
            "BOOL" | "BOOLEAN" => NativeClass::Bool,
            "BYTEA" | "BLOB" | "BINARY" | "VARBINARY" | "TINYBLOB" | "MEDIUMBLOB"
            | "LONGBLOB" => NativeClass::Bytes,
            _ => NativeClass::Text,
        }
    }
}

/// Decode one cell by its native type.
///
/// A typed decode that fails (an unsigned value past `i64::MAX`, say) falls
/// back to the text rendering; a cell that is not even text becomes NULL.
fn decode_cell<R>(row: &R, idx: usize) -> CellValue
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i64: Decode<'r, R::Database>,
    for<'r> f64: Decode<'r, R::Database>,
    for<'r> bool: Decode<'r, R::Database>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    let class = match row.try_get_raw(idx) {
        Ok(value) => {
            if value.is_null() {
                return CellValue::Null;
            }
            let type_info = value.type_info();
            NativeClass::of(type_info.name())
        }
        Err(e) => {
            tracing::debug!(column = idx, error = %e, "unreadable cell treated as missing");
            return CellValue::Null;
        }
    };

    let typed = match class {
        NativeClass::Int => row.try_get_unchecked::<i64, _>(idx).map(CellValue::Int),
        NativeClass::Float => row.try_get_unchecked::<f64, _>(idx).map(CellValue::Float),
        NativeClass::Bool => row.try_get_unchecked::<bool, _>(idx).map(CellValue::Bool),
        NativeClass::Bytes => row.try_get_unchecked::<Vec<u8>, _>(idx).map(CellValue::Bytes),
        NativeClass::Text => row.try_get_unchecked::<String, _>(idx).map(CellValue::Text),
    };

    typed
        .or_else(|_| row.try_get_unchecked::<String, _>(idx).map(CellValue::Text))
        .unwrap_or_else(|e| {
            tracing::debug!(column = idx, error = %e, "undecodable cell treated as missing");
            CellValue::Null
        })
}
