pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-source profile fields consumed by an adapter (e.g. an author id).
pub type SourceFields = BTreeMap<String, String>;

/// One observation of a publication as reported by one external source.
/// Immutable once emitted by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u32>,
    /// Citation count as reported by this source. `None` when the source
    /// cannot report counts, which is distinct from a count of zero.
    pub cites: Option<u32>,
    /// Source-specific identifier, opaque to the engine.
    pub external_ref: String,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Profile field not configured: {0}")]
    MissingField(&'static str),
    #[error("fetch timed out")]
    Timeout,
}

/// A single external scholarly source. Implementations fetch the configured
/// author profile and emit normalized records; they never panic on missing
/// response fields and report failures as `AdapterError`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Profile keys this adapter accepts, used for field-level validation.
    fn profile_keys(&self) -> &[&str];

    async fn fetch(&self, fields: &SourceFields) -> Result<Vec<SourceRecord>, AdapterError>;
}
