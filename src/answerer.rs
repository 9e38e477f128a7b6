//! Final answer synthesis from the router's selection.

use crate::error::Result;
use crate::llm::ModelProfile;
use crate::models::{AnalysisRecord, ItemDescriptor};
use crate::session::Session;

/// Detailed context for every selected item, in selection order.
pub fn build_context(items: &[(ItemDescriptor, AnalysisRecord)]) -> String {
    items
        .iter()
        .map(|(item, record)| {
            let columns = record
                .raw_schema
                .0
                .iter()
                .map(|c| format!("  - {} ({})", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "### {kind} {name}\nRows: {rows}\nSummary: {summary}\nColumns:\n{columns}\nSample data:\n{preview}",
                kind = item.kind,
                name = item.full_name(),
                rows = record.metrics.total_rows,
                summary = record.summary.trim(),
                columns = columns,
                preview = record.data_preview,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are a data analyst answering a question about a database. Use ONLY the context below, which describes the relevant tables, their columns and a sample of their rows.

{context}

Question: "{question}"

Answer strictly from the context. Cite values from the sample data when they help. If the context is not sufficient to answer, say so explicitly and explain what information is missing."#,
        context = context,
        question = question.trim(),
    )
}

/// One final model call. Its failure fails the request.
pub async fn answer(
    session: &Session,
    question: &str,
    items: &[(ItemDescriptor, AnalysisRecord)],
) -> Result<String> {
    let context = build_context(items);
    let prompt = build_answer_prompt(question, &context);
    session.llm.complete(ModelProfile::Chat, &prompt).await
}
