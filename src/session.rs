//! Request-scoped bundle of everything the pipeline stages need.

use std::sync::Arc;

use crate::cache::AnalysisCache;
use crate::config::Config;
use crate::db::{self, Database};
use crate::error::Result;
use crate::llm::{CompletionService, Llm};

/// One connection handle plus the shared, process-wide collaborators.
///
/// Cheap to clone; the aggregator hands a clone to every worker task.
#[derive(Clone)]
pub struct Session {
    pub db: Arc<dyn Database>,
    pub llm: Llm,
    pub cache: Arc<AnalysisCache>,
    pub config: Arc<Config>,
}

impl Session {
    pub fn new(
        db: Arc<dyn Database>,
        service: Arc<dyn CompletionService>,
        cache: Arc<AnalysisCache>,
        config: Arc<Config>,
    ) -> Self {
        let llm = Llm::new(service, &config.llm);
        Self {
            db,
            llm,
            cache,
            config,
        }
    }
}

/// Open a validated handle for `connection_string` and wrap it in a session.
///
/// The returned handle is the same database the session uses; close it when
/// the request is done.
pub async fn open(
    connection_string: &str,
    service: Arc<dyn CompletionService>,
    cache: Arc<AnalysisCache>,
    config: Arc<Config>,
) -> Result<(Session, Arc<dyn Database>)> {
    let handle = db::connect(connection_string, &config).await?;
    let session = Session::new(handle.clone(), service, cache, config);
    Ok((session, handle))
}
