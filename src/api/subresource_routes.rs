//! Sub-resource endpoints: calculations, short-circuit data and the
//! per-panel protocol map.
//!
//! - `GET|PUT|DELETE /api/calculations/:projectId`
//! - `GET|PUT|DELETE /api/cortocircuito/:projectId`
//! - `GET|PUT|DELETE /api/protocolos/:projectId`
//!
//! PUT provisions a stub project when the target is missing and claims
//! orphans; GET and DELETE never create anything and never change
//! ownership.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{AppState, CallerIdentity};
use crate::error::StoreError;
use crate::models::protocol::Protocol;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/calculations/:project_id",
            get(get_calculations)
                .put(put_calculations)
                .delete(delete_calculations),
        )
        .route(
            "/api/cortocircuito/:project_id",
            get(get_cortocircuito)
                .put(put_cortocircuito)
                .delete(delete_cortocircuito),
        )
        .route(
            "/api/protocolos/:project_id",
            get(get_protocolos)
                .put(put_protocolos)
                .delete(delete_protocolos),
        )
}

// ----------------------------------------------------------------------
// Calculations
// ----------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutCalculations {
    calculation_data: Value,
}

async fn get_calculations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    let data = state
        .subresources
        .get_calculations(&project_id, caller.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "calculationData": data })))
}

async fn put_calculations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
    Json(body): Json<PutCalculations>,
) -> Result<Json<Value>, StoreError> {
    state
        .subresources
        .put_calculations(&project_id, caller.as_str(), &body.calculation_data)
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn delete_calculations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    state
        .subresources
        .delete_calculations(&project_id, caller.as_str())
        .await?;
    Ok(Json(json!({ "success": true })))
}

// ----------------------------------------------------------------------
// Short-circuit data
// ----------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutCortocircuito {
    calculos_cortocircuito: Value,
}

async fn get_cortocircuito(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    let data = state
        .subresources
        .get_cortocircuito(&project_id, caller.as_str())
        .await?;
    Ok(Json(json!({ "success": true, "calculosCortocircuito": data })))
}

async fn put_cortocircuito(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
    Json(body): Json<PutCortocircuito>,
) -> Result<Json<Value>, StoreError> {
    state
        .subresources
        .put_cortocircuito(&project_id, caller.as_str(), &body.calculos_cortocircuito)
        .await?;
    Ok(Json(json!({ "success": true })))
}

async fn delete_cortocircuito(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    state
        .subresources
        .delete_cortocircuito(&project_id, caller.as_str())
        .await?;
    Ok(Json(json!({ "success": true })))
}

// ----------------------------------------------------------------------
// Protocolos
// ----------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutProtocolos {
    protocolos_por_tablero: BTreeMap<String, Protocol>,
}

async fn get_protocolos(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    let protocolos = state
        .subresources
        .get_protocolos(&project_id, caller.as_str())
        .await?;
    Ok(Json(
        json!({ "success": true, "protocolosPorTablero": protocolos }),
    ))
}

async fn put_protocolos(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
    Json(body): Json<PutProtocolos>,
) -> Result<Json<Value>, StoreError> {
    let stored = state
        .subresources
        .put_protocolos(&project_id, caller.as_str(), &body.protocolos_por_tablero)
        .await?;
    Ok(Json(
        json!({ "success": true, "protocolosPorTablero": stored }),
    ))
}

async fn delete_protocolos(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, StoreError> {
    state
        .subresources
        .delete_protocolos(&project_id, caller.as_str())
        .await?;
    Ok(Json(json!({ "success": true })))
}
