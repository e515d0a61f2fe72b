//! Route handlers for the kernhash search API.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;

/// Query parameters for `/api/v1/search`. The voice index is required; a
/// request without it is rejected before the engine is ever invoked.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub voice: Option<usize>,
}

/// Search response envelope
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub items_searched: u64,
    pub degraded: bool,
    pub errors: Vec<String>,
    pub results: Vec<RankedResult>,
}

/// Single ranked result
#[derive(Debug, Serialize)]
pub struct RankedResult {
    pub rank: usize,
    pub source_id: String,
    pub match_count: u64,
}

/// Run a melodic search over the fingerprint index.
///
/// The body is raw kern notation text (as produced by the conversion
/// boundary); `voice` selects which voice of a multi-voice query to use.
/// Backend read failures degrade the ranking rather than failing the
/// request: `degraded` is set and `errors` lists the affected lookups.
pub async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
    body: String,
) -> ServerResult<impl IntoResponse> {
    let Some(voice) = params.voice else {
        return Err(ServerError::BadRequest(
            "required parameter voice is missing".into(),
        ));
    };

    let report = state.engine.lookup(&body, voice)?;

    let mut errors = report.errors;
    let mut degraded = report.degraded;
    let items_searched = match state.engine.documents_searched() {
        Ok(count) => count,
        Err(err) => {
            warn!(error = %err, "document count unavailable");
            errors.push(format!("document count unavailable: {err}"));
            degraded = true;
            0
        }
    };

    let results = report
        .results
        .into_iter()
        .enumerate()
        .map(|(idx, result)| RankedResult {
            rank: idx + 1,
            source_id: result.source_id,
            match_count: result.match_count,
        })
        .collect();

    Ok(Json(SearchResponse {
        status: if degraded { "degraded" } else { "success" },
        items_searched,
        degraded,
        errors,
        results,
    }))
}

/// Index statistics
pub async fn stats(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let documents_indexed = state.engine.documents_searched()?;
    Ok(Json(json!({ "documents_indexed": documents_indexed })))
}

/// Liveness check
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// API information for the root path
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "kernhash",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/api/v1/search", "/api/v1/stats", "/health"],
    }))
}

/// Fallback for unknown paths
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
