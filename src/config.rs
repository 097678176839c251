use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::{self, SourceAdapter};

const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 120;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub semantic_scholar_api_key: Option<String>,
    pub openalex_email: Option<String>,
    pub crossref_email: Option<String>,
    pub enabled_source_names: Vec<String>,
    pub per_source_timeout: Duration,
    pub run_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("CITEMETRICS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_or_default().join(".citemetrics"));

        let bind_addr = std::env::var("CITEMETRICS_BIND")
            .unwrap_or_else(|_| "127.0.0.1:8037".to_string());

        let semantic_scholar_api_key = std::env::var("SEMANTIC_SCHOLAR_API_KEY").ok();
        let openalex_email = std::env::var("OPENALEX_EMAIL").ok();
        let crossref_email = std::env::var("CROSSREF_EMAIL").ok();

        let enabled_source_names = std::env::var("CITEMETRICS_SOURCES")
            .map(|s| s.split(',').map(|s| s.trim().to_lowercase()).collect())
            .unwrap_or_default();

        Self {
            data_dir,
            bind_addr,
            semantic_scholar_api_key,
            openalex_email,
            crossref_email,
            enabled_source_names,
            per_source_timeout: env_duration(
                "CITEMETRICS_SOURCE_TIMEOUT_SECS",
                DEFAULT_SOURCE_TIMEOUT_SECS,
            ),
            run_timeout: env_duration("CITEMETRICS_RUN_TIMEOUT_SECS", DEFAULT_RUN_TIMEOUT_SECS),
        }
    }

    /// Build the enabled source adapters in priority order. Registration
    /// order doubles as the merge tie-break order.
    pub fn build_adapters(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let filter = &self.enabled_source_names;
        let filter_active = !filter.is_empty();
        let should_enable =
            |name: &str| -> bool { !filter_active || filter.contains(&name.to_lowercase()) };

        let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
        if should_enable("openalex") {
            adapters.push(Arc::new(sources::openalex::OpenAlexClient::new(
                self.openalex_email.clone(),
            )));
        }
        if should_enable("semantic_scholar") {
            adapters.push(Arc::new(
                sources::semantic_scholar::SemanticScholarClient::new(
                    self.semantic_scholar_api_key.clone(),
                ),
            ));
        }
        if should_enable("crossref") {
            adapters.push(Arc::new(sources::crossref::CrossRefClient::new(
                self.crossref_email.clone(),
            )));
        }
        adapters
    }
}

fn env_duration(name: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

fn dirs_or_default() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
