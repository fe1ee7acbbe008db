//! REST API: resource routers and shared application state.
//!
//! Each route module exposes a `router()` builder; [`router`] merges them
//! into the full API surface. The composition root (the server binary or
//! a test) supplies the state and any middleware layers.

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::database::{ProjectRepository, StatsRepository, SubresourceRepository};

pub mod identity;
pub mod project_routes;
pub mod stats_routes;
pub mod subresource_routes;
pub mod template_routes;

pub use identity::CallerIdentity;

/// Shared handler state. Repositories are cheap clones around one pool,
/// injected here at the composition root.
#[derive(Clone)]
pub struct AppState {
    pub projects: ProjectRepository,
    pub subresources: SubresourceRepository,
    pub stats: StatsRepository,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            projects: ProjectRepository::new(pool.clone()),
            subresources: SubresourceRepository::new(pool.clone()),
            stats: StatsRepository::new(pool),
        }
    }
}

/// Full API router. Layers (trace, CORS) are applied by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .merge(project_routes::router())
        .merge(subresource_routes::router())
        .merge(stats_routes::router())
        .merge(template_routes::router())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}
