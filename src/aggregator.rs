//! Fan-out of the item analyzer over many catalog items.
//!
//! Every item is analyzed on its own tokio task; a semaphore caps how many
//! run at once. The caller waits for all of them. A failing or panicking item
//! only marks its own slot as failed, and the output keeps the input order.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::analyzer::analyze_item;
use crate::models::{AnalysisRecord, ItemDescriptor};
use crate::session::Session;

/// Result of analyzing one item inside a batch.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item: ItemDescriptor,
    pub result: Result<AnalysisRecord, String>,
}

impl ItemOutcome {
    pub fn record(&self) -> Option<&AnalysisRecord> {
        self.result.as_ref().ok()
    }

    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }
}

pub async fn analyze_all(
    session: &Session,
    items: Vec<ItemDescriptor>,
    force_rerun: bool,
) -> Vec<ItemOutcome> {
    let permits = Arc::new(Semaphore::new(session.config.analysis.max_concurrency));

    let handles: Vec<_> = items
        .iter()
        .cloned()
        .map(|item| {
            let session = session.clone();
            let permits = permits.clone();
            tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return Err(e.to_string()),
                };
                analyze_item(&session, &item, force_rerun)
                    .await
                    .map_err(|e| e.to_string())
            })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(items.len());
    for (item, handle) in items.into_iter().zip(handles) {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(format!("analysis task aborted: {}", join_err)),
        };
        if let Err(ref e) = result {
            tracing::warn!(item = %item.full_name(), error = %e, "item analysis failed");
        }
        outcomes.push(ItemOutcome { item, result });
    }

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    tracing::debug!(total = outcomes.len(), failed, "batch analysis finished");
    outcomes
}
