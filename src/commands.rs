//! CLI command implementations.
//!
//! Each `run_*` function opens what it needs from the configuration, does
//! the work through the same library calls the HTTP API uses, and prints a
//! human-readable result to stdout. Diagnostics go to stderr via `tracing`.

use anyhow::Result;
use std::sync::Arc;

use crate::analyzer;
use crate::cache::AnalysisCache;
use crate::catalog;
use crate::config::Config;
use crate::db::Database;
use crate::llm::{self, CompletionService};
use crate::models::AnalysisRecord;
use crate::orchestrator::{self, Mode};
use crate::session::{self, Session};

async fn open(
    config: &Config,
    connection_string: &str,
) -> Result<(Session, Arc<dyn Database>)> {
    let service: Arc<dyn CompletionService> = llm::create_service(&config.llm)?;
    let cache = Arc::new(AnalysisCache::new(config.cache.dir.clone()));
    let (session, handle) =
        session::open(connection_string, service, cache, Arc::new(config.clone())).await?;
    Ok((session, handle))
}

/// `scout connect`: validate a connection and list its tables and views.
pub async fn run_connect(config: &Config, connection_string: &str) -> Result<()> {
    let (session, handle) = open(config, connection_string).await?;
    let result = catalog::discover(session.db.as_ref()).await;
    handle.close().await;
    let catalog = result?;

    println!("Connected ({})", session.db.dialect().name());
    let items = catalog.items();
    if items.is_empty() {
        println!("No tables or views found.");
    }
    for item in items {
        println!("  {:<6} {}", item.kind, item.full_name());
    }
    Ok(())
}

/// `scout catalog`: print the catalog grouped by schema as JSON.
pub async fn run_catalog(config: &Config, connection_string: &str) -> Result<()> {
    let (session, handle) = open(config, connection_string).await?;
    let result = catalog::discover(session.db.as_ref()).await;
    handle.close().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}

/// `scout analyze`: analyze one table or view and print the record.
pub async fn run_analyze(
    config: &Config,
    connection_string: &str,
    schema: Option<&str>,
    item: &str,
    force_rerun: bool,
) -> Result<()> {
    let (session, handle) = open(config, connection_string).await?;
    let result = analyzer::analyze_by_name(&session, schema, item, force_rerun).await;
    handle.close().await;

    print_record(item, &result?);
    Ok(())
}

fn print_record(item: &str, record: &AnalysisRecord) {
    let m = &record.metrics;
    println!("--- {} ---", item);
    println!("total_rows:     {}", m.total_rows);
    println!("columns:        {}", m.columns);
    println!("completeness:   {:.2}%", m.completeness);
    println!("duplicate_rows: {}", m.duplicate_rows);
    println!("analyzed_at:    {}", record.analyzed_at);
    println!();
    println!("--- Summary ---");
    println!("{}", record.summary);
    println!();
    println!("--- Schema ---");
    println!("{}", record.schema_explanation);
    for column in &record.raw_schema.0 {
        println!("  {}: {}", column.name, column.data_type);
    }
    println!();
    println!("--- Preview ---");
    println!("{}", record.data_preview);
}

/// `scout ask`: answer a question and print the answer.
pub async fn run_ask(
    config: &Config,
    connection_string: &str,
    question: &str,
    mode: &str,
    force_rerun: bool,
) -> Result<()> {
    let mode: Mode = mode.parse()?;
    let (session, handle) = open(config, connection_string).await?;
    let result = orchestrator::ask(&session, question, mode, force_rerun).await;
    handle.close().await;
    let response = result?;

    println!("{}", response.answer);
    if !response.selected_items.is_empty() {
        println!();
        println!("Sources: {}", response.selected_items.join(", "));
    }
    if let Some(sql) = &response.generated_query {
        println!();
        println!("Query:");
        println!("{}", sql);
    }
    Ok(())
}

/// `scout cache clear`: delete every cached analysis.
pub fn run_cache_clear(config: &Config) -> Result<()> {
    let cache = AnalysisCache::new(config.cache.dir.clone());
    let removed = cache.clear()?;
    println!(
        "Removed {} cached analyses from {}",
        removed,
        cache.dir().display()
    );
    Ok(())
}
