//! End-to-end pipeline tests against a real SQLite file and a scripted
//! completion service.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use schema_scout::aggregator::analyze_all;
use schema_scout::analyzer::{analyze_by_name, analyze_item};
use schema_scout::cache::AnalysisCache;
use schema_scout::catalog;
use schema_scout::config::Config;
use schema_scout::db::Database;
use schema_scout::dialect::Dialect;
use schema_scout::error::{Result, ScoutError};
use schema_scout::llm::CompletionService;
use schema_scout::models::{CellValue, ColumnInfo, ItemDescriptor, ItemKind, ResultSet};
use schema_scout::orchestrator::{self, Mode, INSUFFICIENT_INFORMATION};
use schema_scout::session::{self, Session};

// ─── Scripted completion service ────────────────────────────────────

/// Answers by recognizing which stage wrote the prompt.
struct Scripted {
    router_reply: String,
    sql_reply: String,
    fail_analysis: bool,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(router_reply: &str, sql_reply: &str) -> Self {
        Self {
            router_reply: router_reply.to_string(),
            sql_reply: sql_reply.to_string(),
            fail_analysis: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing_analysis() -> Self {
        Self {
            fail_analysis: true,
            ..Self::new("NONE", "")
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn count(&self, marker: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(marker)).count()
    }
}

const SUMMARY_MARKER: &str = "Business Friendly Summary";
const SCHEMA_MARKER: &str = "Explain the technical schema";
const ROUTER_MARKER: &str = "You are a data router";
const ANSWER_MARKER: &str = "You are a data analyst";
const SQL_MARKER: &str = "SQL writer";
const EXPLAIN_MARKER: &str = "This SQL query was run";

#[async_trait]
impl CompletionService for Scripted {
    async fn complete(&self, _model: &str, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.contains(SUMMARY_MARKER) {
            if self.fail_analysis {
                return Err(ScoutError::Generation("model offline".into()));
            }
            let name = prompt
                .split("named '")
                .nth(1)
                .and_then(|rest| rest.split('\'').next())
                .unwrap_or("?");
            return Ok(format!("Records of {}.", name));
        }
        if prompt.contains(SCHEMA_MARKER) {
            if self.fail_analysis {
                return Err(ScoutError::Generation("model offline".into()));
            }
            return Ok("Each row has an id.".into());
        }
        if prompt.contains(ROUTER_MARKER) {
            return Ok(self.router_reply.clone());
        }
        if prompt.contains(ANSWER_MARKER) {
            return Ok("Widgets sell best.".into());
        }
        if prompt.contains(SQL_MARKER) {
            return Ok(self.sql_reply.clone());
        }
        if prompt.contains(EXPLAIN_MARKER) {
            return Ok("There are three orders.".into());
        }
        Err(ScoutError::Generation("unexpected prompt".into()))
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

async fn create_db(tmp: &TempDir, statements: &[&str]) -> String {
    let path = tmp.path().join("shop.db");
    let setup_url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = sqlx::SqlitePool::connect(&setup_url).await.unwrap();
    for stmt in statements {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    pool.close().await;
    format!("sqlite://{}", path.display())
}

const ORDERS: &[&str] = &[
    "CREATE TABLE orders (id INTEGER, amount REAL)",
    "INSERT INTO orders VALUES (1, 10.0), (1, 10.0), (2, NULL)",
];

const SHOP: &[&str] = &[
    "CREATE TABLE categories (category_id INTEGER PRIMARY KEY, name TEXT)",
    "CREATE TABLE orders (order_id INTEGER PRIMARY KEY, placed_at TEXT)",
    "CREATE TABLE order_items (order_id INTEGER, product_id INTEGER, quantity INTEGER)",
    "CREATE TABLE products (product_id INTEGER PRIMARY KEY, category_id INTEGER, name TEXT, price REAL)",
    "INSERT INTO categories VALUES (1, 'tools'), (2, 'toys')",
    "INSERT INTO orders VALUES (10, '2026-05-01'), (11, '2026-05-02')",
    "INSERT INTO order_items VALUES (10, 100, 3), (11, 100, 1), (11, 101, 2)",
    "INSERT INTO products VALUES (100, 1, 'widget', 2.5), (101, 2, 'gadget', 9.0)",
];

fn test_config(tmp: &TempDir) -> Arc<Config> {
    let mut cfg = Config::minimal();
    cfg.cache.dir = tmp.path().join("cache");
    Arc::new(cfg)
}

async fn open_session(
    tmp: &TempDir,
    url: &str,
    service: Arc<Scripted>,
) -> (Session, Arc<dyn Database>) {
    let cfg = test_config(tmp);
    let cache = Arc::new(AnalysisCache::new(cfg.cache.dir.clone()));
    session::open(url, service, cache, cfg).await.unwrap()
}

fn orders() -> ItemDescriptor {
    ItemDescriptor::new(None, "orders", ItemKind::Table)
}

// ─── Analysis ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_analysis_metrics_and_preview() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let record = analyze_item(&session, &orders(), false).await.unwrap();

    assert_eq!(record.metrics.total_rows, 3);
    assert_eq!(record.metrics.columns, 2);
    assert_eq!(record.metrics.completeness, 83.33);
    assert_eq!(record.metrics.duplicate_rows, 1);
    assert_eq!(record.raw_schema.column_names(), vec!["id", "amount"]);
    assert_eq!(record.summary, "Records of orders.");
    assert_eq!(record.schema_explanation, "Each row has an id.");
    assert!(record.data_preview.starts_with("| id | amount |\n|---|---|"));
    assert!(record.data_preview.contains("NULL"));
    assert_eq!(service.count(SUMMARY_MARKER), 1);
    assert_eq!(service.count(SCHEMA_MARKER), 1);

    handle.close().await;
}

#[tokio::test]
async fn test_cached_analysis_is_reused() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let first = analyze_item(&session, &orders(), false).await.unwrap();
    let calls = service.prompts().len();
    let second = analyze_item(&session, &orders(), false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(service.prompts().len(), calls);

    // Lookup by name shares the same cache entry.
    let by_name = analyze_by_name(&session, None, "orders", false).await.unwrap();
    assert_eq!(by_name, first);
    assert_eq!(service.prompts().len(), calls);

    handle.close().await;
}

#[tokio::test]
async fn test_force_rerun_bypasses_cache() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    analyze_item(&session, &orders(), false).await.unwrap();
    analyze_item(&session, &orders(), true).await.unwrap();

    assert_eq!(service.count(SUMMARY_MARKER), 2);
    assert_eq!(service.count(SCHEMA_MARKER), 2);

    handle.close().await;
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let err = analyze_by_name(&session, None, "ghost", false)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::NotFound(_)));
    assert_eq!(err.to_string(), "Table 'ghost' not found in schema 'main'.");
    assert!(service.prompts().is_empty());

    handle.close().await;
}

#[tokio::test]
async fn test_view_is_analyzed_by_name() {
    let tmp = TempDir::new().unwrap();
    let mut statements = ORDERS.to_vec();
    statements.push("CREATE VIEW big_orders AS SELECT id, amount FROM orders WHERE amount > 5");
    let url = create_db(&tmp, &statements).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let record = analyze_by_name(&session, None, "big_orders", false)
        .await
        .unwrap();
    assert_eq!(record.metrics.total_rows, 2);
    assert!(service
        .prompts()
        .iter()
        .any(|p| p.contains("view named 'big_orders'")));

    handle.close().await;
}

#[tokio::test]
async fn test_failed_generation_degrades_text_only() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::failing_analysis());
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let record = analyze_item(&session, &orders(), false).await.unwrap();
    assert!(record.summary.starts_with("AI generation failed:"));
    assert!(record.schema_explanation.starts_with("AI generation failed:"));
    assert_eq!(record.metrics.total_rows, 3);

    handle.close().await;
}

#[tokio::test]
async fn test_empty_table_preview() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, &["CREATE TABLE audit (id INTEGER, note TEXT)"]).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let item = ItemDescriptor::new(None, "audit", ItemKind::Table);
    let record = analyze_item(&session, &item, false).await.unwrap();
    assert_eq!(record.metrics.total_rows, 0);
    assert_eq!(record.metrics.columns, 2);
    assert_eq!(record.metrics.completeness, 100.0);
    assert!(record.data_preview.starts_with("| id | note |"));
    assert!(record.data_preview.ends_with("(no rows)"));

    handle.close().await;
}

/// A PostgreSQL-shaped catalog with one table in a named schema.
struct SalesDb;

#[async_trait]
impl Database for SalesDb {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn identity(&self) -> &str {
        "postgres://fixture/sales"
    }

    fn default_schema(&self) -> Option<&str> {
        Some("public")
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(vec!["public".into(), "sales".into()])
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(match schema {
            Some("sales") => BTreeSet::from(["orders".to_string()]),
            _ => BTreeSet::new(),
        })
    }

    async fn list_views(&self, _schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn list_columns(&self, _schema: Option<&str>, _item: &str) -> Result<Vec<ColumnInfo>> {
        Ok(vec![
            ColumnInfo {
                name: "id".into(),
                data_type: "integer".into(),
            },
            ColumnInfo {
                name: "amount".into(),
                data_type: "numeric".into(),
            },
        ])
    }

    async fn fetch(&self, sql: &str) -> Result<ResultSet> {
        assert_eq!(sql, "SELECT * FROM \"sales\".\"orders\" LIMIT 100");
        Ok(ResultSet {
            columns: vec!["id".into(), "amount".into()],
            rows: vec![
                vec![CellValue::Int(1), CellValue::Float(10.0)],
                vec![CellValue::Int(1), CellValue::Float(10.0)],
                vec![CellValue::Int(2), CellValue::Null],
            ],
        })
    }

    async fn fetch_scalar(&self, _sql: &str) -> Result<i64> {
        Ok(3)
    }
}

#[tokio::test]
async fn test_qualified_item_in_named_schema() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let cache = Arc::new(AnalysisCache::new(cfg.cache.dir.clone()));
    let service = Arc::new(Scripted::new("sales.orders", ""));
    let session = Session::new(Arc::new(SalesDb), service.clone(), cache, cfg);

    let cat = catalog::discover(session.db.as_ref()).await.unwrap();
    let names: Vec<_> = cat.items().iter().map(|i| i.full_name()).collect();
    assert_eq!(names, vec!["sales.orders"]);

    let item = ItemDescriptor::new(Some("sales"), "orders", ItemKind::Table);
    let record = analyze_item(&session, &item, false).await.unwrap();
    assert_eq!(record.metrics.total_rows, 3);
    assert_eq!(record.metrics.columns, 2);
    assert_eq!(record.metrics.completeness, 83.33);
    assert_eq!(record.metrics.duplicate_rows, 1);
    assert_eq!(record.summary, "Records of sales.orders.");

    let response = orchestrator::ask(&session, "Total order value?", Mode::Summary, false)
        .await
        .unwrap();
    assert_eq!(response.selected_items, vec!["sales.orders"]);
    // The overview pass reused the analysis above.
    assert_eq!(service.count(SUMMARY_MARKER), 1);
}

/// A SQL-Server-shaped catalog; records every query it is asked to run.
#[derive(Default)]
struct LedgerDb {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl Database for LedgerDb {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    fn identity(&self) -> &str {
        "mssql://fixture/ledger"
    }

    fn default_schema(&self) -> Option<&str> {
        Some("dbo")
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(vec!["dbo".into()])
    }

    async fn list_tables(&self, _schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::from(["orders".to_string()]))
    }

    async fn list_views(&self, _schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn list_columns(&self, _schema: Option<&str>, _item: &str) -> Result<Vec<ColumnInfo>> {
        Ok(vec![ColumnInfo {
            name: "id".into(),
            data_type: "int".into(),
        }])
    }

    async fn fetch(&self, sql: &str) -> Result<ResultSet> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(ResultSet {
            columns: vec!["id".into()],
            rows: vec![vec![CellValue::Int(1)], vec![CellValue::Int(2)]],
        })
    }

    async fn fetch_scalar(&self, sql: &str) -> Result<i64> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(2)
    }
}

#[tokio::test]
async fn test_top_dialect_samples_with_top_clause() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let cache = Arc::new(AnalysisCache::new(cfg.cache.dir.clone()));
    let db = Arc::new(LedgerDb::default());
    let session = Session::new(db.clone(), Arc::new(Scripted::new("NONE", "")), cache, cfg);

    let record = analyze_by_name(&session, Some("dbo"), "orders", false)
        .await
        .unwrap();
    assert_eq!(record.metrics.total_rows, 2);

    let queries = db.queries.lock().unwrap().clone();
    assert_eq!(
        queries,
        vec![
            "SELECT TOP 100 * FROM [dbo].[orders]".to_string(),
            "SELECT COUNT(*) FROM [dbo].[orders]".to_string(),
        ]
    );
}

// ─── Fan-out ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fan_out_isolates_failures_and_keeps_order() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let items = vec![
        ItemDescriptor::new(None, "products", ItemKind::Table),
        ItemDescriptor::new(None, "ghost", ItemKind::Table),
        ItemDescriptor::new(None, "categories", ItemKind::Table),
    ];
    let outcomes = analyze_all(&session, items, false).await;

    let names: Vec<_> = outcomes.iter().map(|o| o.item.name.as_str()).collect();
    assert_eq!(names, vec!["products", "ghost", "categories"]);
    assert!(!outcomes[0].is_failed());
    assert!(outcomes[1].is_failed());
    assert!(!outcomes[2].is_failed());
    assert!(outcomes[1].result.as_ref().unwrap_err().contains("not found"));

    handle.close().await;
}

// ─── Summary mode ───────────────────────────────────────────────────

#[tokio::test]
async fn test_catalog_lists_default_schema_items() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service).await;

    let cat = catalog::discover(session.db.as_ref()).await.unwrap();
    let names: Vec<_> = cat.items().iter().map(|i| i.full_name()).collect();
    assert_eq!(names, vec!["categories", "order_items", "orders", "products"]);

    handle.close().await;
}

#[tokio::test]
async fn test_router_selects_join_tables() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("order_items, products", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let response = orchestrator::ask(
        &session,
        "Which products are most popular?",
        Mode::Summary,
        false,
    )
        .await
        .unwrap();

    assert_eq!(response.mode, "summary");
    assert_eq!(response.answer, "Widgets sell best.");
    assert_eq!(response.selected_items, vec!["order_items", "products"]);
    assert!(response.generated_query.is_none());

    let prompts = service.prompts();
    let router_prompt = prompts.iter().find(|p| p.contains(ROUTER_MARKER)).unwrap();
    for table in ["categories", "order_items", "orders", "products"] {
        assert!(router_prompt.contains(&format!("- {} (TABLE)", table)));
    }
    assert!(router_prompt.contains("product_id"));

    let answer_prompt = prompts.iter().find(|p| p.contains(ANSWER_MARKER)).unwrap();
    assert!(answer_prompt.contains("### TABLE order_items"));
    assert!(answer_prompt.contains("### TABLE products"));
    assert!(!answer_prompt.contains("### TABLE categories"));

    // Four items analyzed once each; the detailed pass hits the cache.
    assert_eq!(service.count(SUMMARY_MARKER), 4);

    handle.close().await;
}

#[tokio::test]
async fn test_empty_selection_is_insufficient_information() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let response = orchestrator::ask(&session, "What is the weather?", Mode::Summary, false)
        .await
        .unwrap();

    assert_eq!(response.answer, INSUFFICIENT_INFORMATION);
    assert!(response.selected_items.is_empty());
    assert_eq!(service.count(ANSWER_MARKER), 0);

    handle.close().await;
}

#[tokio::test]
async fn test_unknown_router_names_are_dropped() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("invoices, PRODUCTS", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let response = orchestrator::ask(&session, "What do we sell?", Mode::Summary, false)
        .await
        .unwrap();
    assert_eq!(response.selected_items, vec!["products"]);

    handle.close().await;
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, ORDERS).await;
    let service = Arc::new(Scripted::new("NONE", ""));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let err = orchestrator::ask(&session, "   ", Mode::Summary, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::BadRequest(_)));
    assert!(service.prompts().is_empty());

    handle.close().await;
}

/// A catalog whose every read is rejected by the engine.
struct UnreadableDb;

#[async_trait]
impl Database for UnreadableDb {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn identity(&self) -> &str {
        "postgres://fixture/unreadable"
    }

    fn default_schema(&self) -> Option<&str> {
        Some("public")
    }

    async fn list_schemas(&self) -> Result<Vec<String>> {
        Ok(vec!["public".into()])
    }

    async fn list_tables(&self, schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(match schema {
            None | Some("public") => BTreeSet::from(["orders".to_string(), "products".to_string()]),
            _ => BTreeSet::new(),
        })
    }

    async fn list_views(&self, _schema: Option<&str>) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn list_columns(&self, _schema: Option<&str>, _item: &str) -> Result<Vec<ColumnInfo>> {
        Ok(vec![ColumnInfo {
            name: "amount".into(),
            data_type: "numeric".into(),
        }])
    }

    async fn fetch(&self, sql: &str) -> Result<ResultSet> {
        Err(ScoutError::execution(sql, "error occurred while decoding column amount"))
    }

    async fn fetch_scalar(&self, sql: &str) -> Result<i64> {
        Err(ScoutError::execution(sql, "error occurred while decoding column amount"))
    }
}

#[tokio::test]
async fn test_every_analysis_failing_is_an_error_not_insufficient_information() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let cache = Arc::new(AnalysisCache::new(cfg.cache.dir.clone()));
    let service = Arc::new(Scripted::new("orders", ""));
    let session = Session::new(Arc::new(UnreadableDb), service.clone(), cache, cfg);

    let err = orchestrator::ask(&session, "Total order amount?", Mode::Summary, false)
        .await
        .unwrap_err();

    assert!(matches!(err, ScoutError::Analysis(_)));
    let msg = err.to_string();
    assert!(msg.contains("orders:"), "{}", msg);
    assert!(msg.contains("products:"), "{}", msg);
    assert!(msg.contains("decoding column amount"), "{}", msg);
    // Nothing to route over, so the router is never asked.
    assert_eq!(service.count(ROUTER_MARKER), 0);
    assert_eq!(service.count(ANSWER_MARKER), 0);
}

// ─── SQL mode ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_sql_mode_runs_generated_query() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new(
        "NONE",
        "```sql\nSELECT COUNT(*) AS n FROM orders\n```",
    ));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let response = orchestrator::ask(&session, "How many orders?", Mode::Sql, false)
        .await
        .unwrap();

    assert_eq!(response.mode, "sql");
    assert_eq!(response.answer, "There are three orders.");
    assert_eq!(
        response.generated_query.as_deref(),
        Some("SELECT COUNT(*) AS n FROM orders")
    );
    // No per-item analysis in sql mode.
    assert_eq!(service.count(SUMMARY_MARKER), 0);

    let prompts = service.prompts();
    let sql_prompt = prompts.iter().find(|p| p.contains(SQL_MARKER)).unwrap();
    assert!(sql_prompt.contains("CREATE TABLE \"order_items\""));
    let explain_prompt = prompts.iter().find(|p| p.contains(EXPLAIN_MARKER)).unwrap();
    assert!(explain_prompt.contains("n\n2"));

    handle.close().await;
}

#[tokio::test]
async fn test_sql_mode_reports_rejected_query() {
    let tmp = TempDir::new().unwrap();
    let url = create_db(&tmp, SHOP).await;
    let service = Arc::new(Scripted::new("NONE", "SELECT nope FROM invoices"));
    let (session, handle) = open_session(&tmp, &url, service.clone()).await;

    let response = orchestrator::ask(&session, "Total invoiced?", Mode::Sql, false)
        .await
        .unwrap();

    assert!(response.answer.contains("Error:"));
    assert!(response.answer.contains("SELECT nope FROM invoices"));
    assert_eq!(
        response.generated_query.as_deref(),
        Some("SELECT nope FROM invoices")
    );
    assert_eq!(service.count(EXPLAIN_MARKER), 0);

    handle.close().await;
}

// ─── Connection ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_database_is_connection_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let missing = tmp.path().join("nope").join("missing.db");
    let url = format!("sqlite://{}", missing.display());

    let err = schema_scout::db::connect(&url, &cfg).await.err().unwrap();
    assert!(matches!(err, ScoutError::Connection(_)));
}
