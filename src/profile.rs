//! Per-source profile configuration: the fields adapters consume, such as
//! an author id at a given source. Updates are validated field by field and
//! applied independently of any running aggregation; they only influence
//! the next run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sources::{SourceAdapter, SourceFields};

pub const MAX_FIELD_LENGTH: usize = 128;

/// All configured per-source fields for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceProfile {
    sources: BTreeMap<String, SourceFields>,
}

/// One requested field change. An empty value clears the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub source: String,
    pub key: String,
    pub value: String,
}

/// A rejected field change, reported alongside the accepted ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub source: String,
    pub key: String,
    pub reason: String,
}

impl SourceProfile {
    pub fn fields(&self, source: &str) -> Option<&SourceFields> {
        self.sources.get(source)
    }

    /// Validate and apply each update independently. Invalid fields are
    /// reported and skipped; valid fields in the same batch still land.
    pub fn apply_updates(
        &mut self,
        updates: Vec<FieldUpdate>,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for update in updates {
            match validate(&update, adapters) {
                Ok(()) => self.apply(update),
                Err(reason) => errors.push(FieldError {
                    source: update.source,
                    key: update.key,
                    reason,
                }),
            }
        }
        errors
    }

    fn apply(&mut self, update: FieldUpdate) {
        let value = update.value.trim().to_string();
        if value.is_empty() {
            if let Some(fields) = self.sources.get_mut(&update.source) {
                fields.remove(&update.key);
                if fields.is_empty() {
                    self.sources.remove(&update.source);
                }
            }
        } else {
            self.sources
                .entry(update.source)
                .or_default()
                .insert(update.key, value);
        }
    }
}

fn validate(update: &FieldUpdate, adapters: &[Arc<dyn SourceAdapter>]) -> Result<(), String> {
    let adapter = adapters
        .iter()
        .find(|a| a.name() == update.source)
        .ok_or_else(|| format!("unknown source: {}", update.source))?;

    if !adapter.profile_keys().contains(&update.key.as_str()) {
        return Err(format!(
            "unknown key for {}: {}",
            update.source, update.key
        ));
    }

    if update.value.len() > MAX_FIELD_LENGTH {
        return Err(format!(
            "value must be {} characters or less",
            MAX_FIELD_LENGTH
        ));
    }

    if update.value.chars().any(char::is_control) {
        return Err("value must not contain control characters".to_string());
    }

    Ok(())
}
