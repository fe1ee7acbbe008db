//! FAT protocol store REST API server.
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (database file created if missing)
//! DATABASE_URL=sqlite://fat-protocols.db PORT=4000 cargo run --bin fat_server
//!
//! # Test endpoints
//! curl -H 'x-user-id: alice' http://localhost:4000/api/projects
//! curl -X POST http://localhost:4000/api/projects \
//!   -H 'x-user-id: alice' -H 'Content-Type: application/json' \
//!   -d '{"name": "Tablero General TG-01", "client_name": "ACME"}'
//! curl http://localhost:4000/api/health
//! ```

use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fat_protocols::api::{self, AppState};
use fat_protocols::database::schema;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fat_protocols=info,tower_http=debug".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://fat-protocols.db".to_string());

    info!("connecting to database: {}", database_url);
    let options = SqliteConnectOptions::from_str(&database_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to open database")?;

    schema::init(&pool)
        .await
        .context("schema bootstrap failed")?;

    let state = AppState::new(pool);
    let app = api::router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(4000);
    let addr = format!("0.0.0.0:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
