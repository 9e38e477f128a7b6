use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sql: SqlConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.scout/analysis_cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_sql_model")]
    pub sql_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: None,
            chat_model: default_chat_model(),
            sql_model: default_sql_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_chat_model() -> String {
    "llama3".to_string()
}
fn default_sql_model() -> String {
    "sqlcoder".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rows: default_sample_rows(),
            preview_rows: default_preview_rows(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_sample_rows() -> usize {
    100
}
fn default_preview_rows() -> usize {
    5
}
fn default_max_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    8
}
fn default_query_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqlConfig {
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            max_result_rows: default_max_result_rows(),
        }
    }
}

fn default_max_result_rows() -> usize {
    50
}

impl Config {
    /// Every section at its default. Used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
            database: DatabaseConfig::default(),
            sql: SqlConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.analysis.sample_rows == 0 {
        anyhow::bail!("analysis.sample_rows must be > 0");
    }

    if config.analysis.max_concurrency == 0 {
        anyhow::bail!("analysis.max_concurrency must be > 0");
    }

    if config.database.max_connections == 0 {
        anyhow::bail!("database.max_connections must be > 0");
    }

    if config.llm.timeout_secs == 0 || config.database.query_timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs and database.query_timeout_secs must be > 0");
    }

    if config.llm.chat_model.trim().is_empty() || config.llm.sql_model.trim().is_empty() {
        anyhow::bail!("llm.chat_model and llm.sql_model must not be empty");
    }

    match config.llm.provider.as_str() {
        "ollama" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be ollama or openai.",
            other
        ),
    }

    Ok(())
}
