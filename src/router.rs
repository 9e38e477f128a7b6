//! Narrowing a catalog to the items a question needs.
//!
//! The router shows the model one compact line per item (name, kind,
//! single-line summary, column names) and asks for a flat comma-separated
//! list of fully-qualified names. An empty selection is a valid outcome: it
//! means nothing in the catalog looks relevant.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::aggregator::ItemOutcome;
use crate::error::Result;
use crate::llm::ModelProfile;
use crate::models::{ItemKind, SelectionSet};
use crate::session::Session;

const SUMMARY_MAX_CHARS: usize = 400;

static HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*#{1,6}\s*").unwrap());
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:[-*+]|\d+[.)])\s+").unwrap());
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*{1,3}|_{2,3}|`+").unwrap());
/// `_text_` emphasis. Underscores inside identifiers such as `order_id` stay.
static UNDERSCORE_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^\s_](?:[^\n]*?[^\s_])?)_\b").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// What the router knows about one item.
#[derive(Debug, Clone)]
pub struct RouterEntry {
    pub full_name: String,
    pub kind: ItemKind,
    pub summary: String,
    pub column_names: Vec<String>,
}

impl RouterEntry {
    /// Entries for every successfully analyzed item, in catalog order.
    pub fn from_outcomes(outcomes: &[ItemOutcome]) -> Vec<RouterEntry> {
        outcomes
            .iter()
            .filter_map(|o| {
                let record = o.record()?;
                Some(RouterEntry {
                    full_name: o.item.full_name(),
                    kind: o.item.kind,
                    summary: record.summary.clone(),
                    column_names: record
                        .raw_schema
                        .column_names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
            })
            .collect()
    }
}

/// Strip markdown headers, emphasis and list markers and fold to one line.
pub fn compact_summary(text: &str) -> String {
    let text = HEADER.replace_all(text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = UNDERSCORE_EMPHASIS.replace_all(&text, "$1");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() > SUMMARY_MAX_CHARS {
        let cut: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}…", cut.trim_end())
    } else {
        text.to_string()
    }
}

pub fn build_router_prompt(question: &str, entries: &[RouterEntry]) -> String {
    let catalog = entries
        .iter()
        .map(|e| {
            format!(
                "- {} ({}): {} | columns: {}",
                e.full_name,
                e.kind,
                compact_summary(&e.summary),
                e.column_names.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a data router. A user asked a question about a database. Below is the catalog of available tables and views, one per line, with a short summary and their columns.

Catalog:
{catalog}

Question: "{question}"

Select the smallest set of tables and views needed to answer the question. If answering requires combining tables, include every table needed for the join, following id-like columns (for example order_id or product_id) that link them.

Reply with a comma-separated list of fully-qualified names exactly as written in the catalog and nothing else. If no table is relevant, reply with NONE."#,
        catalog = catalog,
        question = question.trim(),
    )
}

/// Parse the router's reply into a selection.
pub fn parse_selection(reply: &str) -> SelectionSet {
    let mut seen = HashSet::new();
    reply
        .split([',', '\n'])
        .map(|token| {
            let token = LIST_MARKER.replace(token, "");
            token
                .trim()
                .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | '.' | '*'))
                .trim()
                .to_string()
        })
        .filter(|token| !token.is_empty() && !token.eq_ignore_ascii_case("none"))
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Ask the model which items answer `question`.
///
/// A failed model call fails the request: there is no fallback selection.
pub async fn select(
    session: &Session,
    question: &str,
    entries: &[RouterEntry],
) -> Result<SelectionSet> {
    if entries.is_empty() {
        return Ok(SelectionSet::new());
    }

    let prompt = build_router_prompt(question, entries);
    let reply = session.llm.complete(ModelProfile::Chat, &prompt).await?;
    let selection = parse_selection(&reply);
    tracing::info!(selected = ?selection, "router selection");
    Ok(selection)
}
