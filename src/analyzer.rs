//! Per-item analysis.
//!
//! Produces an [`AnalysisRecord`] for one table or view: sample-based
//! metrics, the column listing, a short preview, and two model-written
//! descriptions. Results are served from and written to the
//! [`AnalysisCache`](crate::cache::AnalysisCache).
//!
//! Connection, not-found and execution failures abort the analysis. A failed
//! model call only replaces its own text field with a placeholder.

use std::collections::HashSet;

use crate::cache::{AnalysisCache, CacheKey};
use crate::error::{Result, ScoutError};
use crate::llm::ModelProfile;
use crate::models::{AnalysisRecord, ItemDescriptor, ItemKind, Metrics, RawSchema, ResultSet};
use crate::session::Session;

const PREVIEW_CELL_MAX_CHARS: usize = 60;

pub async fn analyze_item(
    session: &Session,
    item: &ItemDescriptor,
    force_rerun: bool,
) -> Result<AnalysisRecord> {
    let key = AnalysisCache::key(session.db.identity(), item.schema.as_deref(), &item.name);

    if !force_rerun {
        if let Some(record) = session.cache.get(&key) {
            return Ok(record);
        }
    }

    // Re-check against the live catalog before the name is interpolated.
    match locate(session, item.schema.as_deref(), &item.name).await? {
        Some(_) => run_analysis(session, item, &key).await,
        None => Err(not_found(session, item.schema.as_deref(), &item.name, item.kind)),
    }
}

/// Analyze an item known only by name, resolving whether it is a table or a view.
///
/// A cache hit is returned without touching the database.
pub async fn analyze_by_name(
    session: &Session,
    schema: Option<&str>,
    name: &str,
    force_rerun: bool,
) -> Result<AnalysisRecord> {
    let key = AnalysisCache::key(session.db.identity(), schema, name);

    if !force_rerun {
        if let Some(record) = session.cache.get(&key) {
            return Ok(record);
        }
    }

    match locate(session, schema, name).await? {
        Some(kind) => run_analysis(session, &ItemDescriptor::new(schema, name, kind), &key).await,
        None => Err(not_found(session, schema, name, ItemKind::Table)),
    }
}

async fn run_analysis(
    session: &Session,
    item: &ItemDescriptor,
    key: &CacheKey,
) -> Result<AnalysisRecord> {
    let db = session.db.as_ref();
    let schema = item.schema.as_deref();
    let dialect = db.dialect();
    let table_ref = dialect.qualify(schema, &item.name);
    let sample_sql = dialect.limited_select(&table_ref, session.config.analysis.sample_rows);
    let count_sql = dialect.count_query(&table_ref);

    let sample = db.fetch(&sample_sql).await.map_err(|e| {
        tracing::warn!(sql = %sample_sql, error = %e, "sample query failed");
        e
    })?;
    let total_rows = db.fetch_scalar(&count_sql).await?;
    let raw_schema = RawSchema(db.list_columns(schema, &item.name).await?);

    // Zero-row samples carry no column metadata; fall back to the catalog.
    let header: Vec<String> = if sample.columns.is_empty() {
        raw_schema.column_names().iter().map(|c| c.to_string()).collect()
    } else {
        sample.columns.clone()
    };
    let metrics = Metrics {
        total_rows,
        columns: header.len(),
        completeness: completeness(&sample),
        duplicate_rows: duplicate_rows(&sample),
    };
    let data_preview = render_preview(&header, &sample, session.config.analysis.preview_rows);

    let summary_prompt = build_summary_prompt(item, &header, &data_preview);
    let schema_prompt = build_schema_prompt(item, &raw_schema);
    let (summary, schema_explanation) = tokio::join!(
        session.llm.generate(ModelProfile::Chat, &summary_prompt),
        session.llm.generate(ModelProfile::Chat, &schema_prompt),
    );

    let record = AnalysisRecord {
        metrics,
        summary: summary.render(),
        schema_explanation: schema_explanation.render(),
        raw_schema,
        data_preview,
        analyzed_at: chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string(),
    };

    session.cache.put(key, &record);
    tracing::info!(item = %item.full_name(), rows = total_rows, "analyzed");
    Ok(record)
}

/// Whether `name` is a table or a view in `schema`, or neither.
async fn locate(session: &Session, schema: Option<&str>, name: &str) -> Result<Option<ItemKind>> {
    let db = session.db.as_ref();

    let tables = db
        .list_tables(schema)
        .await
        .map_err(|e| ScoutError::Catalog(format!("Could not verify table existence: {}", e)))?;
    if tables.contains(name) {
        return Ok(Some(ItemKind::Table));
    }

    match db.list_views(schema).await {
        Ok(views) if views.contains(name) => Ok(Some(ItemKind::View)),
        Ok(_) | Err(ScoutError::Unsupported(_)) => Ok(None),
        Err(e) => Err(ScoutError::Catalog(format!(
            "Could not verify view existence: {}",
            e
        ))),
    }
}

fn not_found(session: &Session, schema: Option<&str>, name: &str, kind: ItemKind) -> ScoutError {
    let schema_label = schema
        .or(session.db.default_schema())
        .unwrap_or("default");
    let label = match kind {
        ItemKind::Table => "Table",
        ItemKind::View => "View",
    };
    ScoutError::NotFound(format!(
        "{} '{}' not found in schema '{}'.",
        label, name, schema_label
    ))
}

/// `100 × (1 − missing / cells)`, two decimals; 100 for an empty sample.
pub fn completeness(sample: &ResultSet) -> f64 {
    let cells: usize = sample.rows.iter().map(Vec::len).sum();
    if cells == 0 {
        return 100.0;
    }
    let missing = sample
        .rows
        .iter()
        .flatten()
        .filter(|cell| cell.is_null())
        .count();
    round2(100.0 * (1.0 - missing as f64 / cells as f64))
}

/// Rows equal to some earlier row of the sample.
pub fn duplicate_rows(sample: &ResultSet) -> usize {
    let mut seen = HashSet::with_capacity(sample.rows.len());
    sample.rows.iter().filter(|row| !seen.insert(*row)).count()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Markdown table of the first `limit` rows.
pub fn render_preview(columns: &[String], sample: &ResultSet, limit: usize) -> String {
    if columns.is_empty() {
        return "(no columns)".to_string();
    }

    let header: Vec<String> = columns.iter().map(|c| preview_cell(c)).collect();
    let mut out = format!("| {} |\n", header.join(" | "));
    out.push_str(&format!("|{}\n", "---|".repeat(columns.len())));

    if sample.rows.is_empty() {
        out.push_str("(no rows)");
        return out;
    }

    for row in sample.rows.iter().take(limit) {
        let cells: Vec<String> = row.iter().map(|c| preview_cell(&c.to_string())).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.trim_end().to_string()
}

fn preview_cell(text: &str) -> String {
    let flat = text.replace(['\n', '\r'], " ").replace('|', "\\|");
    if flat.chars().count() > PREVIEW_CELL_MAX_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CELL_MAX_CHARS).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}

fn build_summary_prompt(item: &ItemDescriptor, columns: &[String], preview: &str) -> String {
    format!(
        r#"Analyze this database {kind} named '{name}'.
Columns: {columns}
Sample Data:
{preview}

Write a brief "Business Friendly Summary" (2-3 sentences) describing what this data represents and a "Use Case" for why a business would analyze it."#,
        kind = item.kind.to_string().to_lowercase(),
        name = item.full_name(),
        columns = columns.join(", "),
        preview = preview,
    )
}

fn build_schema_prompt(item: &ItemDescriptor, raw_schema: &RawSchema) -> String {
    let listing = raw_schema
        .0
        .iter()
        .map(|c| format!("{}: {}", c.name, c.data_type))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"Explain the technical schema of {kind} '{name}' to a non-technical user.
Columns and types: {listing}

Explain the relationships between columns if obvious (e.g., ID linking to other things). Keep it human-friendly."#,
        kind = item.kind.to_string().to_lowercase(),
        name = item.full_name(),
        listing = listing,
    )
}
