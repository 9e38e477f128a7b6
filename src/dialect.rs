//! Per-dialect capability table.
//!
//! A [`Dialect`] is resolved once from the connection string when a handle is
//! opened and carried with it; nothing downstream re-inspects the URL. It
//! answers the three questions the pipeline needs to build SQL text safely:
//! how to quote an identifier, how to cap the number of returned rows, and
//! which schema unqualified names resolve against.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MsSql,
    Generic,
}

/// Row-limiting syntax family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// `SELECT TOP n * FROM t`
    Top,
    /// `SELECT * FROM t LIMIT n`
    Limit,
}

impl Dialect {
    pub fn from_url(url: &str) -> Self {
        let scheme = url
            .split_once(':')
            .map(|(s, _)| s.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "sqlite" => Dialect::Sqlite,
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "mssql" | "sqlserver" => Dialect::MsSql,
            _ => Dialect::Generic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Generic => "generic",
        }
    }

    pub fn row_limit(&self) -> RowLimit {
        match self {
            Dialect::MsSql => RowLimit::Top,
            _ => RowLimit::Limit,
        }
    }

    /// The administrative namespace unqualified names resolve to.
    ///
    /// MySQL has none of its own; its default is the connected database and
    /// is resolved by the handle at connect time.
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => Some("main"),
            Dialect::Postgres => Some("public"),
            Dialect::MsSql => Some("dbo"),
            Dialect::MySql | Dialect::Generic => None,
        }
    }

    /// Quote a single identifier, doubling any embedded closing quote.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::MsSql => format!("[{}]", ident.replace(']', "]]")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quoted, optionally schema-qualified reference to an item.
    pub fn qualify(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!("{}.{}", self.quote_ident(schema), self.quote_ident(name)),
            None => self.quote_ident(name),
        }
    }

    /// `SELECT *` over `table_ref` returning at most `n` rows.
    pub fn limited_select(&self, table_ref: &str, n: usize) -> String {
        match self.row_limit() {
            RowLimit::Top => format!("SELECT TOP {} * FROM {}", n, table_ref),
            RowLimit::Limit => format!("SELECT * FROM {} LIMIT {}", table_ref, n),
        }
    }

    pub fn count_query(&self, table_ref: &str) -> String {
        format!("SELECT COUNT(*) FROM {}", table_ref)
    }

    /// Bind placeholder for the `n`-th (1-based) parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::MsSql => format!("@p{}", n),
            _ => "?".to_string(),
        }
    }
}
