//! Answering by generating and running a query.
//!
//! The agent renders the catalog as DDL-like text, asks the SQL model for one
//! query, runs it verbatim against the live connection, and asks the chat
//! model to explain the rows. Execution failures do not fail the request:
//! the response explains the database error and shows the generated query.
//!
//! Generated SQL is trusted as-is. There is no read-only sandbox; the only
//! guard is the prompt asking for a single read-only query.

use regex::Regex;
use std::sync::LazyLock;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::llm::ModelProfile;
use crate::models::{QueryPlan, ResultSet, SqlAnswer};
use crate::session::Session;

/// A fenced block with any one-word info string (`sql`, `sqlite`, `postgresql`).
static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[ \t]*[\w+.-]*[ \t]*\r?\n(.*?)```").unwrap());

/// A line holding only a fence marker and its info string.
static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*```[ \t]*[\w+.-]*[ \t]*\r?$\n?").unwrap());

/// `CREATE TABLE|VIEW name (col type, ...);` for every catalog item.
pub async fn render_schema_text(session: &Session, catalog: &Catalog) -> Result<String> {
    let db = session.db.as_ref();
    let dialect = db.dialect();
    let mut blocks = Vec::new();

    for item in catalog.items() {
        let columns = db.list_columns(item.schema.as_deref(), &item.name).await?;
        let column_defs = columns
            .iter()
            .map(|c| format!("{} {}", dialect.quote_ident(&c.name), c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        blocks.push(format!(
            "CREATE {} {} ({});",
            item.kind,
            dialect.qualify(item.schema.as_deref(), &item.name),
            column_defs
        ));
    }

    Ok(blocks.join("\n"))
}

pub fn build_sql_prompt(dialect_name: &str, schema_text: &str, question: &str) -> String {
    format!(
        r#"You are an expert {dialect} SQL writer. Given the database schema below, write exactly one read-only SQL query that answers the question.

Schema:
{schema}

Question: "{question}"

Use only the tables and columns listed in the schema and quote identifiers the way the schema does. Return the query inside a single ```sql fenced block and nothing else."#,
        dialect = dialect_name,
        schema = schema_text,
        question = question.trim(),
    )
}

/// Pull the query out of the model's reply.
///
/// Takes the first fenced block; when there is none, strips any stray fence
/// lines and markers and a leading `sql` tag from the whole reply.
pub fn extract_sql(reply: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(reply) {
        let body = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !body.is_empty() {
            return body.to_string();
        }
    }

    let stripped = FENCE_LINE.replace_all(reply, "").replace("```", "");
    let stripped = stripped.trim();
    match stripped.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("sql\n") => stripped[4..].trim().to_string(),
        _ => stripped.to_string(),
    }
}

/// Plain-text table of at most `limit` rows, or the no-results marker.
pub fn render_result(result: &ResultSet, limit: usize) -> String {
    if result.rows.is_empty() {
        return "(no results)".to_string();
    }

    let mut out = result.columns.join(" | ");
    for row in result.rows.iter().take(limit) {
        out.push('\n');
        out.push_str(
            &row.iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }
    if result.rows.len() > limit {
        out.push_str(&format!("\n... ({} more rows)", result.rows.len() - limit));
    }
    out
}

fn build_explain_prompt(plan: &QueryPlan, result_text: &str) -> String {
    format!(
        r#"A user asked: "{question}"

This SQL query was run to answer it:
{sql}

It returned:
{result}

Answer the user's question in plain language based on this result. If the result is empty, say that no matching data was found."#,
        question = plan.origin_question.trim(),
        sql = plan.sql_text,
        result = result_text,
    )
}

pub async fn run(session: &Session, catalog: &Catalog, question: &str) -> Result<SqlAnswer> {
    let schema_text = render_schema_text(session, catalog).await?;
    let dialect = session.db.dialect();
    let prompt = build_sql_prompt(dialect.name(), &schema_text, question);

    let reply = session.llm.complete(ModelProfile::Sql, &prompt).await?;
    let plan = QueryPlan {
        sql_text: extract_sql(&reply),
        origin_question: question.to_string(),
    };
    tracing::info!(sql = %plan.sql_text, "generated query");

    let result = match session.db.fetch(&plan.sql_text).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "generated query failed");
            return Ok(SqlAnswer {
                answer: format!(
                    "I generated a query for your question, but the database rejected it.\n\nError: {}\n\nGenerated query:\n{}",
                    e, plan.sql_text
                ),
                generated_query: plan.sql_text,
            });
        }
    };

    let result_text = render_result(&result, session.config.sql.max_result_rows);
    let answer = session
        .llm
        .generate(ModelProfile::Chat, &build_explain_prompt(&plan, &result_text))
        .await;

    let answer = if answer.is_failed() {
        format!("{}\n\nQuery result:\n{}", answer.render(), result_text)
    } else {
        answer.render()
    };

    Ok(SqlAnswer {
        answer,
        generated_query: plan.sql_text,
    })
}
