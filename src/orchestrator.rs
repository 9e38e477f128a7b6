//! Question dispatch.
//!
//! `summary` mode answers from cached per-item analyses: every item is
//! analyzed (usually a cache hit), the router picks the relevant subset, the
//! subset is re-read in detail and the answerer composes the reply. `sql`
//! mode skips all of that and goes straight to the SQL agent against live
//! data.

use std::str::FromStr;

use crate::aggregator::{analyze_all, ItemOutcome};
use crate::answerer;
use crate::catalog::{self, Catalog};
use crate::error::{Result, ScoutError};
use crate::models::{AskResponse, ItemDescriptor};
use crate::router::{self, RouterEntry};
use crate::session::Session;
use crate::sql_agent;

pub const INSUFFICIENT_INFORMATION: &str = "I could not find any tables or views in this database that are relevant to your question, so there is not enough information to answer it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Summary,
    Sql,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Summary => "summary",
            Mode::Sql => "sql",
        }
    }
}

impl FromStr for Mode {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(Mode::Summary),
            "sql" => Ok(Mode::Sql),
            other => Err(ScoutError::BadRequest(format!(
                "Unknown mode: '{}'. Use summary or sql.",
                other
            ))),
        }
    }
}

pub async fn ask(
    session: &Session,
    question: &str,
    mode: Mode,
    force_rerun: bool,
) -> Result<AskResponse> {
    if question.trim().is_empty() {
        return Err(ScoutError::BadRequest(
            "question must not be empty".to_string(),
        ));
    }

    let catalog = catalog::discover(session.db.as_ref()).await?;

    match mode {
        Mode::Summary => ask_summary(session, &catalog, question, force_rerun).await,
        Mode::Sql => {
            let out = sql_agent::run(session, &catalog, question).await?;
            Ok(AskResponse {
                mode: mode.as_str().to_string(),
                answer: out.answer,
                selected_items: Vec::new(),
                generated_query: Some(out.generated_query),
            })
        }
    }
}

async fn ask_summary(
    session: &Session,
    catalog: &Catalog,
    question: &str,
    force_rerun: bool,
) -> Result<AskResponse> {
    let overview = analyze_all(session, catalog.items(), force_rerun).await;
    if let Some(err) = all_failed(&overview) {
        return Err(err);
    }
    let entries = RouterEntry::from_outcomes(&overview);
    let selection = router::select(session, question, &entries).await?;

    let mut resolved: Vec<ItemDescriptor> = Vec::new();
    for name in &selection {
        match catalog.resolve(name) {
            Some(item) if !resolved.contains(&item) => resolved.push(item),
            Some(_) => {}
            None => tracing::warn!(name = %name, "router picked an unknown item, ignoring"),
        }
    }

    let detailed = analyze_all(session, resolved, false).await;
    if let Some(err) = all_failed(&detailed) {
        return Err(err);
    }
    let context: Vec<_> = detailed
        .into_iter()
        .filter_map(|o| match o.result {
            Ok(record) => Some((o.item, record)),
            Err(_) => None,
        })
        .collect();

    if context.is_empty() {
        return Ok(AskResponse {
            mode: Mode::Summary.as_str().to_string(),
            answer: INSUFFICIENT_INFORMATION.to_string(),
            selected_items: Vec::new(),
            generated_query: None,
        });
    }

    let selected_items = context.iter().map(|(item, _)| item.full_name()).collect();

    let answer = answerer::answer(session, question, &context).await?;
    Ok(AskResponse {
        mode: Mode::Summary.as_str().to_string(),
        answer,
        selected_items,
        generated_query: None,
    })
}

/// An error naming every item's failure when a non-empty batch has no
/// successful analysis. Partial failures are tolerated.
fn all_failed(outcomes: &[ItemOutcome]) -> Option<ScoutError> {
    if outcomes.is_empty() || outcomes.iter().any(|o| !o.is_failed()) {
        return None;
    }
    let causes: Vec<String> = outcomes
        .iter()
        .filter_map(|o| {
            o.result
                .as_ref()
                .err()
                .map(|e| format!("{}: {}", o.item.full_name(), e))
        })
        .collect();
    Some(ScoutError::Analysis(causes.join("; ")))
}
