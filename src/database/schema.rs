//! Schema bootstrap.
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS` statements run at startup.
//! JSON documents live in TEXT columns and are parsed at the repository
//! boundary; activities cascade-delete with their project.

use sqlx::SqlitePool;

const CREATE_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id                      TEXT PRIMARY KEY,
    name                    TEXT NOT NULL,
    description             TEXT NOT NULL DEFAULT '',
    owner_id                TEXT NOT NULL,
    project_type            TEXT NOT NULL DEFAULT '',
    status                  TEXT NOT NULL DEFAULT 'draft',
    client_name             TEXT NOT NULL DEFAULT '',
    client_email            TEXT NOT NULL DEFAULT '',
    client_phone            TEXT NOT NULL DEFAULT '',
    location                TEXT NOT NULL DEFAULT '',
    client_logo_url         TEXT NOT NULL DEFAULT '',
    tableros                TEXT NOT NULL DEFAULT '[]',
    calculation_data        TEXT NOT NULL DEFAULT '{}',
    protocolos_ensayos      TEXT NOT NULL DEFAULT '{}',
    calculos_cortocircuito  TEXT NOT NULL DEFAULT '{}',
    metadata                TEXT NOT NULL DEFAULT '{}',
    calculation_count       INTEGER NOT NULL DEFAULT 0,
    protocolo_count         INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL
)
"#;

const CREATE_ACTIVITIES: &str = r#"
CREATE TABLE IF NOT EXISTS project_activities (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id    TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    user_id       TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL
)
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_projects_owner_updated ON projects(owner_id, updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_activities_project ON project_activities(project_id)",
];

/// Create tables and indexes if they do not exist yet.
pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_PROJECTS).execute(pool).await?;
    sqlx::query(CREATE_ACTIVITIES).execute(pool).await?;
    for stmt in CREATE_INDEXES {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
