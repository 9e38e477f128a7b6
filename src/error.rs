//! Error taxonomy for the question-answering pipeline.
//!
//! Every variant carries the lower-level error text so callers can show it to
//! the user. Cache failures never appear here: the cache logs and swallows
//! them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    /// The database could not be reached or the connection string is invalid.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A schema or item does not exist in the live catalog.
    #[error("{0}")]
    NotFound(String),

    /// Catalog introspection failed.
    #[error("Failed to retrieve catalog: {0}")]
    Catalog(String),

    /// A query was rejected or failed while running.
    #[error("Execution failed on sql '{sql}': {message}")]
    Execution { sql: String, message: String },

    /// Every item of a batch failed to analyze; the per-item causes are
    /// listed in the message.
    #[error("Analysis failed for every item: {0}")]
    Analysis(String),

    /// The dialect has no way to answer this catalog request (e.g. views).
    #[error("Unsupported by this database: {0}")]
    Unsupported(String),

    /// A language-model call failed or returned unusable output.
    #[error("AI generation failed: {0}")]
    Generation(String),

    /// A model call or query ran past its configured deadline.
    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),

    /// The request itself is malformed (unknown mode, empty question, ...).
    #[error("{0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoutError {
    pub fn execution(sql: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ScoutError::Execution {
            sql: sql.into(),
            message: err.to_string(),
        }
    }

    /// Machine-readable code used in HTTP error bodies and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            ScoutError::Connection(_) => "connection_failed",
            ScoutError::NotFound(_) => "not_found",
            ScoutError::Catalog(_) => "catalog_failed",
            ScoutError::Execution { .. } => "execution_failed",
            ScoutError::Analysis(_) => "analysis_failed",
            ScoutError::Unsupported(_) => "unsupported",
            ScoutError::Generation(_) => "generation_failed",
            ScoutError::Timeout(..) => "timeout",
            ScoutError::BadRequest(_) => "bad_request",
            ScoutError::Io(_) | ScoutError::Json(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
