//! Statistics endpoints.
//!
//! - `GET /api/stats/dashboard`       — caller-scoped aggregates
//! - `GET /api/stats/system`          — store-wide totals
//! - `GET /api/stats/recent-projects` — most recently updated projects

use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{AppState, CallerIdentity};
use crate::error::StoreError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/stats/dashboard", get(dashboard))
        .route("/api/stats/system", get(system))
        .route("/api/stats/recent-projects", get(recent_projects))
}

async fn dashboard(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<Value>, StoreError> {
    let stats = state.stats.dashboard(caller.as_str()).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

async fn system(State(state): State<AppState>) -> Result<Json<Value>, StoreError> {
    let stats = state.stats.system().await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<i64>,
}

async fn recent_projects(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Value>, StoreError> {
    let limit = query.limit.unwrap_or(5).clamp(1, 50);
    let projects = state.stats.recent_projects(caller.as_str(), limit).await?;
    let count = projects.len();
    Ok(Json(json!({
        "success": true,
        "projects": projects,
        "count": count,
    })))
}
