//! Multi-source publication aggregation, identity resolution, and
//! bibliometrics.
//!
//! The engine fans out to scholarly source adapters, resolves which
//! per-source records describe the same publication, merges each group into
//! one canonical record, reconciles citation counts, and derives the
//! h/g/e/i impact indices. Results are published as per-user snapshots that
//! readers consume without ever blocking on a running aggregation; a thin
//! REST layer in [`rest`] exposes the snapshots and the force-merge
//! trigger.

pub mod config;
pub mod engine;
pub mod merge;
pub mod metrics;
pub mod profile;
pub mod resolve;
pub mod rest;
pub mod snapshot;
pub mod sources;

pub use engine::{AggregationRun, Engine, RunId, RunState};
pub use profile::{FieldError, FieldUpdate, SourceProfile};
pub use snapshot::{MetricsSnapshot, Publication, Snapshot, SnapshotStore};
pub use sources::{AdapterError, SourceAdapter, SourceRecord};
