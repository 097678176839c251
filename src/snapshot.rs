//! Published data model and on-disk persistence.
//!
//! A `Snapshot` is the unit of publication: the canonical publication set
//! plus the metrics derived from it, swapped atomically as one value on
//! every successful aggregation run.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::profile::SourceProfile;

/// Canonical, deduplicated representation of one real-world publication
/// across all contributing sources. Never mutated after creation; each run
/// replaces the whole set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub name: String,
    pub authors: Vec<String>,
    pub year: Option<u32>,
    /// Unified citation count. `None` means no contributing source reported
    /// a count, which readers must not render as zero.
    pub cites: Option<u32>,
    pub sources: BTreeSet<String>,
}

/// Derived, read-only impact summary over the publication set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pub_count: usize,
    pub avg_author_count: f64,
    pub h_index: u32,
    pub g_index: u32,
    pub e_index: f64,
    /// Index k holds the count of publications cited at least k+1 times.
    pub i_indices: Vec<u32>,
}

impl MetricsSnapshot {
    pub fn empty() -> Self {
        Self {
            pub_count: 0,
            avg_author_count: 0.0,
            h_index: 0,
            g_index: 0,
            e_index: 0.0,
            i_indices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub publications: Vec<Publication>,
    pub metrics: MetricsSnapshot,
}

impl Snapshot {
    /// The snapshot served before any run has succeeded.
    pub fn empty() -> Self {
        Self {
            version: 0,
            updated_at: Utc::now(),
            publications: Vec::new(),
            metrics: MetricsSnapshot::empty(),
        }
    }
}

/// Per-user JSON persistence under one data directory. Writes go through a
/// temp file in the target directory and are renamed into place, so readers
/// of the file never observe a half-written snapshot.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load_snapshot(&self, user: &str) -> Option<Snapshot> {
        load_json(&self.user_dir(user).join("snapshot.json"))
    }

    pub fn save_snapshot(&self, user: &str, snapshot: &Snapshot) -> Result<()> {
        save_json(&self.user_dir(user).join("snapshot.json"), snapshot)
    }

    pub fn load_profile(&self, user: &str) -> Option<SourceProfile> {
        load_json(&self.user_dir(user).join("profile.json"))
    }

    pub fn save_profile(&self, user: &str, profile: &SourceProfile) -> Result<()> {
        save_json(&self.user_dir(user).join("profile.json"), profile)
    }

    fn user_dir(&self, user: &str) -> PathBuf {
        self.root.join(dirname_for(user))
    }
}

/// User ids are opaque and may contain path separators or characters that
/// collide on case-insensitive filesystems, so directory names are the
/// sha256 of the id.
fn dirname_for(user: &str) -> String {
    hex::encode(Sha256::digest(user.as_bytes()))
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let file = File::open(path).ok()?;
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("discarding unreadable {}: {}", path.display(), e);
            None
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .context("persistence path has no parent directory")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&tmp, value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
