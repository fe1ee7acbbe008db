//! Checklist template endpoints.
//!
//! - `GET /api/templates`                   — full catalog
//! - `GET /api/templates/:id`               — one template
//! - `GET /api/templates/dashboard/grouped` — grouped by category
//!
//! Templates are a static catalog; no identity required.

use std::collections::BTreeMap;

use axum::extract::Path;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::error::StoreError;
use crate::templates::{template_by_id, TemplateView, CHECKLIST_TEMPLATES};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/templates", get(list_templates))
        .route("/api/templates/:id", get(get_template))
        .route("/api/templates/dashboard/grouped", get(grouped_templates))
}

async fn list_templates() -> Json<Value> {
    let templates: Vec<TemplateView> = CHECKLIST_TEMPLATES.iter().map(TemplateView::from).collect();
    let count = templates.len();
    Json(json!({ "success": true, "templates": templates, "count": count }))
}

async fn get_template(Path(id): Path<String>) -> Result<Json<Value>, StoreError> {
    let template = template_by_id(&id).ok_or(StoreError::NotFound)?;
    Ok(Json(
        json!({ "success": true, "template": TemplateView::from(template) }),
    ))
}

async fn grouped_templates() -> Json<Value> {
    let mut grouped: BTreeMap<&'static str, Vec<TemplateView>> = BTreeMap::new();
    for template in &CHECKLIST_TEMPLATES {
        grouped
            .entry(template.categoria)
            .or_default()
            .push(TemplateView::from(template));
    }
    Json(json!({ "success": true, "grouped": grouped }))
}
