//! Project CRUD endpoints.
//!
//! - `GET    /api/projects`                — caller's projects
//! - `POST   /api/projects`                — create (name required)
//! - `GET    /api/projects/:id`            — single project
//! - `PUT    /api/projects/:id`            — partial update
//! - `DELETE /api/projects/:id`            — delete with activity cascade
//! - `GET    /api/projects/:id/activities` — audit trail

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::{AppState, CallerIdentity};
use crate::error::StoreError;
use crate::models::project::{Activity, NewProject, Project};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/projects/:id/activities", get(list_activities))
}

#[derive(Serialize)]
struct ProjectListResponse {
    success: bool,
    projects: Vec<Project>,
    count: usize,
}

async fn list_projects(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ProjectListResponse>, StoreError> {
    let projects = state.projects.list_for_owner(caller.as_str()).await?;
    let count = projects.len();
    Ok(Json(ProjectListResponse {
        success: true,
        projects,
        count,
    }))
}

async fn get_project(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    let project = state.projects.get(&id, caller.as_str()).await?;
    Ok(Json(json!({ "success": true, "project": project })))
}

async fn create_project(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<NewProject>,
) -> Result<(StatusCode, Json<Value>), StoreError> {
    let project = state.projects.create(caller.as_str(), body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "project": project })),
    ))
}

async fn update_project(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StoreError> {
    let patch = body
        .as_object()
        .ok_or_else(|| StoreError::Validation("request body must be a JSON object".into()))?;
    let project = state.projects.update(&id, caller.as_str(), patch).await?;
    Ok(Json(json!({ "success": true, "project": project })))
}

async fn delete_project(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    state.projects.delete(&id, caller.as_str()).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Serialize)]
struct ActivityListResponse {
    success: bool,
    activities: Vec<Activity>,
    count: usize,
}

async fn list_activities(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<ActivityListResponse>, StoreError> {
    let activities = state.projects.activities(&id, caller.as_str()).await?;
    let count = activities.len();
    Ok(Json(ActivityListResponse {
        success: true,
        activities,
        count,
    }))
}
