//! Aggregation orchestrator: drives one end-to-end merge cycle per user and
//! publishes its result atomically.
//!
//! Per-user state is the unit of isolation. Readers always get the last
//! published snapshot without blocking on a running cycle; the publish step
//! swaps one `Arc` under a write lock held only for the pointer store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::merge::{self, SourcePriority};
use crate::metrics;
use crate::profile::{FieldError, FieldUpdate, SourceProfile};
use crate::resolve;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::sources::{AdapterError, SourceAdapter, SourceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Status of one merge cycle. At most one run per user is `Running` at any
/// time; per-source failures are data here, never run-fatal on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationRun {
    pub id: RunId,
    pub state: RunState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub per_source_errors: BTreeMap<String, String>,
}

impl AggregationRun {
    fn idle() -> Self {
        Self {
            id: RunId(0),
            state: RunState::Idle,
            started_at: None,
            finished_at: None,
            per_source_errors: BTreeMap::new(),
        }
    }
}

struct UserState {
    snapshot: RwLock<Arc<Snapshot>>,
    run: Mutex<AggregationRun>,
    profile: RwLock<SourceProfile>,
}

pub struct Engine {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    priority: SourcePriority,
    store: SnapshotStore,
    per_source_timeout: Duration,
    run_timeout: Duration,
    users: RwLock<HashMap<String, Arc<UserState>>>,
    next_run_id: AtomicU64,
}

impl Engine {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: SnapshotStore,
        per_source_timeout: Duration,
        run_timeout: Duration,
    ) -> Self {
        let priority = SourcePriority::new(adapters.iter().map(|a| a.name().to_string()));
        Self {
            adapters,
            priority,
            store,
            per_source_timeout,
            run_timeout,
            users: RwLock::new(HashMap::new()),
            next_run_id: AtomicU64::new(0),
        }
    }

    /// The currently published snapshot; never blocks on a running cycle.
    pub async fn snapshot(&self, user: &str) -> Arc<Snapshot> {
        let state = self.user_state(user).await;
        let guard = state.snapshot.read().await;
        Arc::clone(&guard)
    }

    /// Status of the current (or most recent) run for this user.
    pub async fn run_status(&self, user: &str) -> AggregationRun {
        let state = self.user_state(user).await;
        let run = state.run.lock().await;
        run.clone()
    }

    pub async fn source_profile(&self, user: &str) -> SourceProfile {
        let state = self.user_state(user).await;
        let profile = state.profile.read().await;
        profile.clone()
    }

    /// Names and accepted profile keys of every registered adapter.
    pub fn sources_info(&self) -> Vec<SourceInfo> {
        self.adapters
            .iter()
            .map(|a| SourceInfo {
                name: a.name().to_string(),
                keys: a.profile_keys().iter().map(|k| k.to_string()).collect(),
            })
            .collect()
    }

    /// Apply per-field profile updates, returning the rejected fields.
    /// Independent of any running merge; takes effect on the next run only.
    pub async fn update_sources(&self, user: &str, updates: Vec<FieldUpdate>) -> Vec<FieldError> {
        let state = self.user_state(user).await;
        let mut profile = state.profile.write().await;
        let errors = profile.apply_updates(updates, &self.adapters);
        if let Err(e) = self.store.save_profile(user, &profile) {
            tracing::warn!("failed to persist profile for {}: {:#}", user, e);
        }
        errors
    }

    /// Start a merge cycle for this user, or return the in-flight run's id
    /// if one is already running. Returns immediately; the cycle completes
    /// in a background task and publishes atomically.
    pub async fn trigger_merge(self: &Arc<Self>, user: &str) -> RunId {
        let state = self.user_state(user).await;
        let mut run = state.run.lock().await;
        if run.state == RunState::Running {
            tracing::debug!("merge already running for {}, run {}", user, run.id.0);
            return run.id;
        }

        let id = RunId(self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1);
        *run = AggregationRun {
            id,
            state: RunState::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            per_source_errors: BTreeMap::new(),
        };
        drop(run);

        tracing::info!("starting merge run {} for {}", id.0, user);
        let engine = Arc::clone(self);
        let user = user.to_string();
        tokio::spawn(async move {
            engine.execute_run(&user, state, id).await;
        });
        id
    }

    async fn execute_run(&self, user: &str, state: Arc<UserState>, id: RunId) {
        let profile = state.profile.read().await.clone();
        let (records, errors) = self.fetch_all(&profile).await;

        // A failed source still leaves the others' data mergeable; only a
        // clean sweep of failures aborts and retains the prior snapshot.
        if self.adapters.is_empty() || errors.len() == self.adapters.len() {
            tracing::warn!("merge run {} for {} failed: no usable source", id.0, user);
            Self::finish_run(&state, id, RunState::Failed, errors).await;
            return;
        }

        let version = state.snapshot.read().await.version + 1;
        let snapshot = build_snapshot(records, &self.priority, version);
        tracing::info!(
            "merge run {} for {} built {} publications from {} sources",
            id.0,
            user,
            snapshot.publications.len(),
            self.adapters.len() - errors.len(),
        );

        if let Err(e) = self.store.save_snapshot(user, &snapshot) {
            tracing::warn!("failed to persist snapshot for {}: {:#}", user, e);
        }
        *state.snapshot.write().await = Arc::new(snapshot);

        // Partial success is still success.
        Self::finish_run(&state, id, RunState::Succeeded, errors).await;
    }

    async fn finish_run(
        state: &UserState,
        id: RunId,
        outcome: RunState,
        errors: BTreeMap<String, String>,
    ) {
        let mut run = state.run.lock().await;
        debug_assert_eq!(run.id, id);
        run.state = outcome;
        run.finished_at = Some(Utc::now());
        run.per_source_errors = errors;
    }

    /// Fan out one fetch task per adapter. Each task is bounded by the
    /// per-source timeout and the whole-run deadline; whichever budget runs
    /// out first turns the source into a recorded timeout failure.
    async fn fetch_all(
        &self,
        profile: &SourceProfile,
    ) -> (Vec<SourceRecord>, BTreeMap<String, String>) {
        let deadline = tokio::time::Instant::now() + self.run_timeout;
        let mut handles = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let fields = profile.fields(adapter.name()).cloned().unwrap_or_default();
            let per_source = self.per_source_timeout;
            let name = adapter.name().to_string();
            let handle = tokio::spawn(async move {
                let budgeted = tokio::time::timeout(per_source, adapter.fetch(&fields));
                match tokio::time::timeout_at(deadline, budgeted).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) | Err(_) => Err(AdapterError::Timeout),
                }
            });
            handles.push((name, handle));
        }

        let mut records = Vec::new();
        let mut errors = BTreeMap::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(fetched)) => {
                    tracing::debug!("source {} returned {} records", name, fetched.len());
                    records.extend(fetched);
                }
                Ok(Err(e)) => {
                    tracing::warn!("source {} failed: {}", name, e);
                    errors.insert(name, e.to_string());
                }
                Err(e) => {
                    tracing::warn!("source {} task panicked: {}", name, e);
                    errors.insert(name, "fetch task panicked".to_string());
                }
            }
        }
        (records, errors)
    }

    async fn user_state(&self, user: &str) -> Arc<UserState> {
        if let Some(state) = self.users.read().await.get(user) {
            return Arc::clone(state);
        }

        let mut users = self.users.write().await;
        // Lost the race between locks: someone else may have created it.
        if let Some(state) = users.get(user) {
            return Arc::clone(state);
        }

        let snapshot = self.store.load_snapshot(user).unwrap_or_else(Snapshot::empty);
        let profile = self.store.load_profile(user).unwrap_or_default();
        let state = Arc::new(UserState {
            snapshot: RwLock::new(Arc::new(snapshot)),
            run: Mutex::new(AggregationRun::idle()),
            profile: RwLock::new(profile),
        });
        users.insert(user.to_string(), Arc::clone(&state));
        state
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub keys: Vec<String>,
}

/// The full pipeline from raw records to a publishable snapshot: resolve
/// identities, merge each group, derive metrics. Pure and deterministic for
/// a given record multiset.
pub fn build_snapshot(
    records: Vec<SourceRecord>,
    priority: &SourcePriority,
    version: u64,
) -> Snapshot {
    let groups = resolve::group_records(records);
    let mut publications: Vec<_> = groups
        .iter()
        .map(|group| merge::merge_group(group, priority))
        .collect();
    publications.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.year.cmp(&b.year)));

    let metrics = metrics::compute(&publications);
    Snapshot {
        version,
        updated_at: Utc::now(),
        publications,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, title: &str, cites: Option<u32>) -> SourceRecord {
        SourceRecord {
            source_id: source.to_string(),
            title: title.to_string(),
            authors: vec!["Jane Doe".to_string()],
            year: Some(2020),
            cites,
            external_ref: format!("{}:{}", source, title),
        }
    }

    #[test]
    fn test_build_snapshot_is_arrival_order_independent() {
        let priority = SourcePriority::new(["a", "b"]);
        let records = vec![
            record("a", "Graph Sketching", Some(3)),
            record("b", "Graph sketching", Some(7)),
            record("a", "Stream Summaries", None),
        ];
        let mut shuffled = records.clone();
        shuffled.reverse();

        let forward = build_snapshot(records, &priority, 1);
        let backward = build_snapshot(shuffled, &priority, 1);

        assert_eq!(forward.publications.len(), 2);
        let names: Vec<_> = forward.publications.iter().map(|p| &p.name).collect();
        let names_b: Vec<_> = backward.publications.iter().map(|p| &p.name).collect();
        assert_eq!(names, names_b);
        assert_eq!(forward.metrics, backward.metrics);
        assert_eq!(forward.publications[0].cites, backward.publications[0].cites);
    }
}
