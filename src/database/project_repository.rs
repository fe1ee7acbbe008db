//! Project CRUD and the activity log.
//!
//! Every ownership-bearing statement is a single atomic
//! `... WHERE id = ? AND owner_id = ?`; an unmatched guard surfaces as
//! NotFound so a foreign caller cannot distinguish "missing" from
//! "not yours".

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map as JsonMap, Value as JsonValue};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::project::{
    count_entries, Activity, NewProject, PanelStub, Project, ProjectRow, ProjectStatus,
};
use crate::models::protocol::Protocol;
use crate::templates;

const PROJECT_COLUMNS: &str = "id, name, description, owner_id, project_type, status, \
     client_name, client_email, client_phone, location, client_logo_url, \
     tableros, calculation_data, protocolos_ensayos, calculos_cortocircuito, metadata, \
     calculation_count, protocolo_count, created_at, updated_at";

/// Scalar columns writable through the partial-update path.
const UPDATABLE_TEXT_COLUMNS: [&str; 8] = [
    "name",
    "description",
    "project_type",
    "client_name",
    "client_email",
    "client_phone",
    "location",
    "client_logo_url",
];

enum Bind {
    Text(String),
    Int(i64),
}

#[derive(Clone, Debug)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All projects owned by the caller, most recently updated first.
    pub async fn list_for_owner(&self, owner: &str) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE owner_id = ? ORDER BY updated_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProjectRow::into_project).collect()
    }

    /// Single project; NotFound unless the (id, owner) pair matches.
    pub async fn get(&self, id: &str, owner: &str) -> Result<Project, StoreError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        row.into_project()
    }

    /// Create a project owned by the caller. `name` is required.
    pub async fn create(&self, owner: &str, new: NewProject) -> Result<Project, StoreError> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::Validation("name is required".into()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = new.status.unwrap_or_default();
        let calculation_data = new.calculation_data.unwrap_or_else(|| JsonValue::Object(JsonMap::new()));
        let metadata = new.metadata.unwrap_or_else(|| JsonValue::Object(JsonMap::new()));
        let calculation_count = count_entries(&calculation_data);

        sqlx::query(
            "INSERT INTO projects (id, name, description, owner_id, project_type, status, \
             client_name, client_email, client_phone, location, client_logo_url, \
             tableros, calculation_data, protocolos_ensayos, calculos_cortocircuito, metadata, \
             calculation_count, protocolo_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&name)
        .bind(&new.description)
        .bind(owner)
        .bind(&new.project_type)
        .bind(status)
        .bind(&new.client_name)
        .bind(&new.client_email)
        .bind(&new.client_phone)
        .bind(&new.location)
        .bind(&new.client_logo_url)
        .bind(serde_json::to_string(&new.tableros)?)
        .bind(calculation_data.to_string())
        .bind("{}")
        .bind("{}")
        .bind(metadata.to_string())
        .bind(calculation_count)
        .bind(0i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.log_activity(&id, owner, "created", &format!("Project '{name}' created"))
            .await?;

        info!(project_id = %id, owner = %owner, "project created");

        Ok(Project {
            id,
            name,
            description: new.description,
            owner_id: owner.to_string(),
            project_type: new.project_type,
            status,
            client_name: new.client_name,
            client_email: new.client_email,
            client_phone: new.client_phone,
            location: new.location,
            client_logo_url: new.client_logo_url,
            tableros: new.tableros,
            calculation_data,
            protocolos_ensayos: BTreeMap::new(),
            calculos_cortocircuito: JsonValue::Object(JsonMap::new()),
            metadata,
            calculation_count,
            protocolo_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Partial update: only keys present in the patch are written, absent
    /// keys are untouched, explicit nulls ARE written (coerced to the
    /// column's empty value). Always restamps `updated_at`.
    pub async fn update(
        &self,
        id: &str,
        owner: &str,
        patch: &JsonMap<String, JsonValue>,
    ) -> Result<Project, StoreError> {
        let mut sets: Vec<(&'static str, Bind)> = Vec::new();

        for (key, value) in patch {
            if let Some(column) = UPDATABLE_TEXT_COLUMNS
                .iter()
                .copied()
                .find(|&c| c == key.as_str())
            {
                let text = match value {
                    JsonValue::Null => String::new(),
                    JsonValue::String(s) => s.clone(),
                    other => {
                        return Err(StoreError::Validation(format!(
                            "field '{key}' must be a string, got {other}"
                        )))
                    }
                };
                sets.push((column, Bind::Text(text)));
                continue;
            }

            match key.as_str() {
                "status" => {
                    let status: ProjectStatus = serde_json::from_value(value.clone())
                        .map_err(|_| {
                            StoreError::Validation(format!("invalid status value: {value}"))
                        })?;
                    sets.push(("status", Bind::Text(status.as_str().to_string())));
                }
                "tableros" => {
                    let stubs: Vec<PanelStub> =
                        serde_json::from_value(value.clone()).map_err(|e| {
                            StoreError::Validation(format!("invalid tableros: {e}"))
                        })?;
                    sets.push(("tableros", Bind::Text(serde_json::to_string(&stubs)?)));
                }
                "protocolos_ensayos" => {
                    let mut protocols: BTreeMap<String, Protocol> =
                        serde_json::from_value(value.clone()).map_err(|e| {
                            StoreError::Validation(format!("invalid protocolos_ensayos: {e}"))
                        })?;
                    for protocol in protocols.values_mut() {
                        templates::normalize(protocol);
                    }
                    sets.push((
                        "protocolos_ensayos",
                        Bind::Text(serde_json::to_string(&protocols)?),
                    ));
                    sets.push(("protocolo_count", Bind::Int(protocols.len() as i64)));
                }
                "calculation_data" => {
                    let doc = null_to_empty_object(value);
                    sets.push(("calculation_count", Bind::Int(count_entries(&doc))));
                    sets.push(("calculation_data", Bind::Text(doc.to_string())));
                }
                "calculos_cortocircuito" => {
                    let doc = null_to_empty_object(value);
                    sets.push(("calculos_cortocircuito", Bind::Text(doc.to_string())));
                }
                "metadata" => {
                    let doc = null_to_empty_object(value);
                    sets.push(("metadata", Bind::Text(doc.to_string())));
                }
                // Unknown and non-updatable keys (id, owner_id, counters,
                // timestamps, estado smuggling) are ignored.
                _ => {}
            }
        }

        let now = Utc::now();
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE projects SET ");
        {
            let mut fields = qb.separated(", ");
            for (column, bind) in sets {
                fields.push(format!("{column} = "));
                match bind {
                    Bind::Text(s) => fields.push_bind_unseparated(s),
                    Bind::Int(i) => fields.push_bind_unseparated(i),
                };
            }
            fields.push("updated_at = ");
            fields.push_bind_unseparated(now);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id.to_string());
        qb.push(" AND owner_id = ");
        qb.push_bind(owner.to_string());

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.log_activity(id, owner, "updated", "Project updated")
            .await?;

        self.get(id, owner).await
    }

    /// Delete a project and its activity trail. NotFound on owner
    /// mismatch; the activity delete runs after the guarded project
    /// delete so a foreign caller can never cascade someone else's log.
    pub async fn delete(&self, id: &str, owner: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM project_activities WHERE project_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(project_id = %id, owner = %owner, "project deleted");
        Ok(())
    }

    /// Activity log for a project the caller owns, newest first.
    pub async fn activities(&self, id: &str, owner: &str) -> Result<Vec<Activity>, StoreError> {
        // Ownership gate first; the log itself is not owner-scoped.
        self.get(id, owner).await?;

        let rows = sqlx::query_as::<_, Activity>(
            "SELECT id, project_id, user_id, activity_type, description, created_at \
             FROM project_activities WHERE project_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Append an audit record. Never updated or deleted individually.
    pub async fn log_activity(
        &self,
        project_id: &str,
        user_id: &str,
        activity_type: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO project_activities (project_id, user_id, activity_type, description, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(activity_type)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn null_to_empty_object(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Null => JsonValue::Object(JsonMap::new()),
        other => other.clone(),
    }
}
