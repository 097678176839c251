//! Axum router mapping the REST contracts onto the engine. Handlers stay
//! thin: extract the caller, call the engine, serialize. Identity arrives
//! as an opaque `x-user` header from the upstream auth layer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::{AggregationRun, Engine, RunId, SourceInfo};
use crate::profile::{FieldError, FieldUpdate, SourceProfile};
use crate::snapshot::{MetricsSnapshot, Publication};

pub type SharedEngine = Arc<Engine>;

/// Build and return the full router.
pub fn build_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/rest/publications", get(publications))
        .route("/rest/metrics", get(metrics))
        .route("/rest/force-merge", post(force_merge))
        .route("/rest/sources", get(sources).post(update_sources))
        .route("/rest/status", get(status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

fn user_of(headers: &HeaderMap) -> String {
    headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or("default")
        .to_string()
}

async fn publications(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
) -> Json<Vec<Publication>> {
    let snapshot = engine.snapshot(&user_of(&headers)).await;
    Json(snapshot.publications.clone())
}

async fn metrics(State(engine): State<SharedEngine>, headers: HeaderMap) -> Json<MetricsSnapshot> {
    let snapshot = engine.snapshot(&user_of(&headers)).await;
    Json(snapshot.metrics.clone())
}

#[derive(Serialize)]
struct ForceMergeResponse {
    run_id: RunId,
}

/// Fire and forget: the new data is never returned synchronously, status is
/// observable via `/rest/status` or a later metrics poll.
async fn force_merge(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
) -> (StatusCode, Json<ForceMergeResponse>) {
    let run_id = engine.trigger_merge(&user_of(&headers)).await;
    (StatusCode::ACCEPTED, Json(ForceMergeResponse { run_id }))
}

async fn status(State(engine): State<SharedEngine>, headers: HeaderMap) -> Json<AggregationRun> {
    Json(engine.run_status(&user_of(&headers)).await)
}

#[derive(Serialize)]
struct SourcesResponse {
    available: Vec<SourceInfo>,
    profile: SourceProfile,
}

async fn sources(State(engine): State<SharedEngine>, headers: HeaderMap) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        available: engine.sources_info(),
        profile: engine.source_profile(&user_of(&headers)).await,
    })
}

#[derive(Serialize)]
struct UpdateSourcesResponse {
    errors: Vec<FieldError>,
}

async fn update_sources(
    State(engine): State<SharedEngine>,
    headers: HeaderMap,
    Json(updates): Json<Vec<FieldUpdate>>,
) -> Json<UpdateSourcesResponse> {
    let errors = engine.update_sources(&user_of(&headers), updates).await;
    Json(UpdateSourcesResponse { errors })
}
