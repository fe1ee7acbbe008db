//! Sub-resource flows: stub provisioning, orphan claims, protocol
//! round-trips and corrupt-column handling.

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tower::ServiceExt;

use fat_protocols::api::{self, AppState};
use fat_protocols::database::{schema, SubresourceRepository};
use fat_protocols::editor::{AutosaveCoordinator, SaveState, StoreSink};

async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("connect options")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("failed to open in-memory database");
    schema::init(&pool).await.expect("schema bootstrap");
    pool
}

async fn test_app() -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let app = api::router().with_state(AppState::new(pool.clone()));
    (app, pool)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request build");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn seed_orphan(pool: &SqlitePool, id: &str) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO projects (id, name, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind("Proyecto huérfano")
    .bind("unknown")
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed orphan");
}

async fn owner_of(pool: &SqlitePool, id: &str) -> String {
    let (owner,): (String,) = sqlx::query_as("SELECT owner_id FROM projects WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("owner lookup");
    owner
}

#[tokio::test]
async fn put_provisions_stub_project() {
    let (app, _pool) = test_app().await;

    let (status, _) = request(
        &app,
        "PUT",
        "/api/calculations/proj-from-client",
        Some("alice"),
        Some(json!({ "calculationData": { "vd-1": { "drop": "2.1%" }, "vd-2": { "drop": "0.8%" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "GET",
        "/api/projects/proj-from-client",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project"]["name"], json!("New Project"));
    assert_eq!(body["project"]["owner_id"], json!("alice"));
    assert_eq!(body["project"]["calculation_count"], json!(2));
}

#[tokio::test]
async fn get_never_provisions() {
    let (app, pool) = test_app().await;

    let (status, _) = request(&app, "GET", "/api/calculations/ghost", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "a read must not create anything");
}

#[tokio::test]
async fn orphan_claim_is_first_writer_wins() {
    let (app, pool) = test_app().await;
    seed_orphan(&pool, "orphan-1").await;

    // First writer claims the orphan.
    let (status, _) = request(
        &app,
        "PUT",
        "/api/cortocircuito/orphan-1",
        Some("alice"),
        Some(json!({ "calculosCortocircuito": { "icc": "25kA" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner_of(&pool, "orphan-1").await, "alice");

    // Second caller loses the claim and is told so.
    let (status, body) = request(
        &app,
        "PUT",
        "/api/cortocircuito/orphan-1",
        Some("bob"),
        Some(json!({ "calculosCortocircuito": { "icc": "50kA" } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));
    assert_eq!(owner_of(&pool, "orphan-1").await, "alice");

    // The orphan's data was not overwritten by the loser.
    let (_, body) = request(&app, "GET", "/api/cortocircuito/orphan-1", Some("alice"), None).await;
    assert_eq!(body["calculosCortocircuito"]["icc"], json!("25kA"));
}

#[tokio::test]
async fn orphan_is_readable_without_claiming() {
    let (app, pool) = test_app().await;
    seed_orphan(&pool, "orphan-2").await;

    let (status, _) = request(&app, "GET", "/api/protocolos/orphan-2", Some("carol"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner_of(&pool, "orphan-2").await, "unknown");
}

#[tokio::test]
async fn delete_never_adopts_orphan() {
    let (app, pool) = test_app().await;
    seed_orphan(&pool, "orphan-3").await;
    sqlx::query("UPDATE projects SET calculation_data = ? WHERE id = ?")
        .bind(r#"{"vd-1":{"drop":"2.1%"}}"#)
        .bind("orphan-3")
        .execute(&pool)
        .await
        .expect("seed calculations");

    let (status, body) = request(
        &app,
        "DELETE",
        "/api/calculations/orphan-3",
        Some("mallory"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));

    // Ownership and data are untouched.
    assert_eq!(owner_of(&pool, "orphan-3").await, "unknown");
    let (_, body) = request(&app, "GET", "/api/calculations/orphan-3", Some("mallory"), None).await;
    assert_eq!(body["calculationData"]["vd-1"]["drop"], json!("2.1%"));
}

#[tokio::test]
async fn protocol_roundtrip_preserves_nested_strings() {
    let (app, _pool) = test_app().await;

    let (status, _) = request(
        &app,
        "PUT",
        "/api/protocolos/proj-fat",
        Some("alice"),
        Some(json!({
            "protocolosPorTablero": {
                "panel-1": {
                    "cliente": "ACME",
                    "ordenTrabajo": "OT-1042",
                    "aislamiento": {
                        "instrumento": "Megger MIT515",
                        "mediciones": {
                            "N-RST": { "resistencia2": "12.5", "unidad2": "" }
                        }
                    }
                }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(&app, "GET", "/api/protocolos/proj-fat", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let medicion = &body["protocolosPorTablero"]["panel-1"]["aislamiento"]["mediciones"]["N-RST"];
    assert_eq!(medicion["resistencia2"], json!("12.5"));
    // Empty string survives, absent stays absent.
    assert_eq!(medicion["unidad2"], json!(""));
    assert!(medicion.get("resistencia1").is_none());
    assert_eq!(
        body["protocolosPorTablero"]["panel-1"]["ordenTrabajo"],
        json!("OT-1042")
    );
}

#[tokio::test]
async fn estado_is_derived_not_settable() {
    let (app, _pool) = test_app().await;

    // A smuggled APROBADO on an unanswered checklist is recomputed away.
    let (status, body) = request(
        &app,
        "PUT",
        "/api/protocolos/proj-estado",
        Some("alice"),
        Some(json!({
            "protocolosPorTablero": { "panel-1": { "estado": "APROBADO" } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["protocolosPorTablero"]["panel-1"]["estado"],
        json!("PENDIENTE")
    );

    // One NO rejects the whole protocol.
    let (_, body) = request(
        &app,
        "PUT",
        "/api/protocolos/proj-estado",
        Some("alice"),
        Some(json!({
            "protocolosPorTablero": {
                "panel-1": {
                    "pruebas": { "pr-01": { "estado": "NO", "observacion": "falla rigidez" } }
                }
            }
        })),
    )
    .await;
    assert_eq!(
        body["protocolosPorTablero"]["panel-1"]["estado"],
        json!("RECHAZADO")
    );
}

#[tokio::test]
async fn normalization_backfills_template_on_write() {
    let (app, _pool) = test_app().await;

    let (_, body) = request(
        &app,
        "PUT",
        "/api/protocolos/proj-norm",
        Some("alice"),
        Some(json!({ "protocolosPorTablero": { "panel-1": {} } })),
    )
    .await;
    let panel = &body["protocolosPorTablero"]["panel-1"];
    assert_eq!(panel["estructura"].as_object().unwrap().len(), 5);
    assert_eq!(panel["controlFinal"].as_object().unwrap().len(), 4);
    assert!(panel["aislamiento"]["mediciones"].get("N-RST").is_some());
}

#[tokio::test]
async fn protocolo_count_tracks_panels() {
    let (app, _pool) = test_app().await;

    request(
        &app,
        "PUT",
        "/api/protocolos/proj-count",
        Some("alice"),
        Some(json!({ "protocolosPorTablero": { "panel-1": {}, "panel-2": {} } })),
    )
    .await;

    let (_, body) = request(&app, "GET", "/api/projects/proj-count", Some("alice"), None).await;
    assert_eq!(body["project"]["protocolo_count"], json!(2));

    // DELETE resets the column and the counter.
    let (status, _) =
        request(&app, "DELETE", "/api/protocolos/proj-count", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, "GET", "/api/projects/proj-count", Some("alice"), None).await;
    assert_eq!(body["project"]["protocolo_count"], json!(0));
    assert_eq!(body["project"]["protocolos_ensayos"], json!({}));
}

#[tokio::test]
async fn corrupt_column_is_surfaced_not_masked() {
    let (app, pool) = test_app().await;

    request(
        &app,
        "PUT",
        "/api/calculations/proj-corrupt",
        Some("alice"),
        Some(json!({ "calculationData": { "ok": true } })),
    )
    .await;

    sqlx::query("UPDATE projects SET calculation_data = 'not json' WHERE id = ?")
        .bind("proj-corrupt")
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = request(
        &app,
        "GET",
        "/api/calculations/proj-corrupt",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("stored document is corrupt"));
}

#[tokio::test]
async fn foreign_owner_is_forbidden_on_subresources() {
    let (app, _pool) = test_app().await;

    request(
        &app,
        "PUT",
        "/api/calculations/proj-owned",
        Some("alice"),
        Some(json!({ "calculationData": {} })),
    )
    .await;

    let (status, _) = request(&app, "GET", "/api/calculations/proj-owned", Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        "PUT",
        "/api/calculations/proj-owned",
        Some("bob"),
        Some(json!({ "calculationData": { "stolen": true } })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        request(&app, "DELETE", "/api/calculations/proj-owned", Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn autosave_writes_through_the_store_and_reloads() {
    let pool = test_pool().await;
    let sink = StoreSink::new(SubresourceRepository::new(pool.clone()), "alice");
    let coordinator =
        AutosaveCoordinator::new("proj-autosave", sink, Duration::from_millis(50));

    coordinator.mutate(|editor| {
        editor.open_panel("panel-1");
        editor.set_medicion("panel-1", "N-RST", |m| {
            m.resistencia2 = Some("12.5".into());
        });
    });
    assert!(coordinator.has_pending_changes());

    // Real time: wait out the debounce window plus the write.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(coordinator.save_state(), SaveState::Idle);
    assert!(!coordinator.has_pending_changes());

    coordinator.force_reload().await.expect("reload");
    let panel = coordinator.snapshot("panel-1").expect("panel after reload");
    assert_eq!(
        panel.aislamiento.mediciones["N-RST"].resistencia2.as_deref(),
        Some("12.5")
    );
}
