//! Core data models used throughout schema-scout.
//!
//! These types describe catalog items, the cached per-item analysis, and the
//! responses produced by the two question-answering modes.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Whether a catalog item is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemKind {
    Table,
    View,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ItemKind::Table => "TABLE",
            ItemKind::View => "VIEW",
        })
    }
}

/// A table or view addressable by schema-qualified name.
///
/// `schema == None` is the default-schema marker: the item lives in the
/// namespace the connection resolves unqualified names against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub schema: Option<String>,
    pub name: String,
    pub kind: ItemKind,
}

impl ItemDescriptor {
    pub fn new(schema: Option<&str>, name: &str, kind: ItemKind) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
            kind,
        }
    }

    /// `schema.name`, or just `name` for the default schema.
    pub fn full_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// One schema's worth of discovered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEntry {
    pub schema: Option<String>,
    pub tables: BTreeSet<String>,
    pub views: BTreeSet<String>,
}

impl SchemaEntry {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.views.is_empty()
    }
}

/// A column as reported by the catalog provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// A single value fetched from the database.
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

// Floats compare by bit pattern so rows can be hashed for duplicate detection.
impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => a.to_bits() == b.to_bits(),
            (CellValue::Text(a), CellValue::Text(b)) => a == b,
            (CellValue::Bytes(a), CellValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CellValue::Null => {}
            CellValue::Bool(v) => v.hash(state),
            CellValue::Int(v) => v.hash(state),
            CellValue::Float(v) => v.to_bits().hash(state),
            CellValue::Text(v) => v.hash(state),
            CellValue::Bytes(v) => v.hash(state),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(v) => write!(f, "{}", v),
            CellValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Tabular rows returned by the query executor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Dashboard metrics for one item, computed over the fetched sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_rows: i64,
    pub columns: usize,
    /// Percentage of non-missing cells in the sample, two decimals.
    pub completeness: f64,
    /// Rows in the sample that repeat an earlier sample row.
    pub duplicate_rows: usize,
}

/// Column name → type name, in column order.
///
/// Serialized as a JSON object whose key order follows the table definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSchema(pub Vec<ColumnInfo>);

impl RawSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RawSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for col in &self.0 {
            map.serialize_entry(&col.name, &col.data_type)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RawSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawSchemaVisitor;

        impl<'de> Visitor<'de> for RawSchemaVisitor {
            type Value = RawSchema;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column name to type name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawSchema, A::Error> {
                let mut columns = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, data_type)) = access.next_entry::<String, String>()? {
                    columns.push(ColumnInfo { name, data_type });
                }
                Ok(RawSchema(columns))
            }
        }

        deserializer.deserialize_map(RawSchemaVisitor)
    }
}

/// The cached unit of work product for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub metrics: Metrics,
    pub summary: String,
    pub schema_explanation: String,
    pub raw_schema: RawSchema,
    pub data_preview: String,
    /// ISO-8601 UTC time the analysis ran. Cached records keep their original time.
    pub analyzed_at: String,
}

/// Ordered, de-duplicated fully-qualified names chosen by the router.
pub type SelectionSet = Vec<String>;

/// A generated query and the question it answers. Never persisted.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub sql_text: String,
    pub origin_question: String,
}

/// Output of the SQL agent, in both success and failure branches.
#[derive(Debug, Clone, Serialize)]
pub struct SqlAnswer {
    pub answer: String,
    pub generated_query: String,
}

/// Final response of the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub mode: String,
    pub answer: String,
    /// Items the router selected (summary mode only).
    pub selected_items: Vec<String>,
    /// The query that was generated and run (sql mode only).
    pub generated_query: Option<String>,
}
