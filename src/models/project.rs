//! Project records and their audit trail.
//!
//! A project row carries plain scalar columns plus denormalized JSON
//! columns (`tableros`, `calculation_data`, `protocolos_ensayos`,
//! `calculos_cortocircuito`, `metadata`) stored as TEXT and parsed at the
//! repository boundary. Parsing failures surface as `CorruptColumn`
//! errors rather than being masked with empty documents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::StoreError;
use crate::models::protocol::Protocol;

/// Sentinel owner marking a project as an orphan, eligible for an
/// explicit ownership claim.
pub const ORPHAN_OWNER: &str = "unknown";

/// Project lifecycle status. Stored lowercase as TEXT.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Panel (tablero) stub held on the project record. The full protocol
/// document lives in `protocolos_ensayos`, keyed by the stub id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PanelStub {
    pub id: String,
    pub nombre: String,
    pub descripcion: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Fully parsed project record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub project_type: String,
    pub status: ProjectStatus,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub location: String,
    pub client_logo_url: String,
    pub tableros: Vec<PanelStub>,
    pub calculation_data: JsonValue,
    pub protocolos_ensayos: BTreeMap<String, Protocol>,
    pub calculos_cortocircuito: JsonValue,
    pub metadata: JsonValue,
    pub calculation_count: i64,
    pub protocolo_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row shape: JSON columns still TEXT. Converted to [`Project`] with
/// validation via [`ProjectRow::into_project`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub project_type: String,
    pub status: ProjectStatus,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub location: String,
    pub client_logo_url: String,
    pub tableros: String,
    pub calculation_data: String,
    pub protocolos_ensayos: String,
    pub calculos_cortocircuito: String,
    pub metadata: String,
    pub calculation_count: i64,
    pub protocolo_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    /// Parse the denormalized columns, failing loudly on malformed JSON.
    pub fn into_project(self) -> Result<Project, StoreError> {
        fn parse<T: serde::de::DeserializeOwned>(
            project_id: &str,
            column: &'static str,
            raw: &str,
        ) -> Result<T, StoreError> {
            serde_json::from_str(raw).map_err(|source| StoreError::CorruptColumn {
                project_id: project_id.to_string(),
                column,
                source,
            })
        }

        let tableros: Vec<PanelStub> = parse(&self.id, "tableros", &self.tableros)?;
        let calculation_data: JsonValue =
            parse(&self.id, "calculation_data", &self.calculation_data)?;
        let protocolos_ensayos: BTreeMap<String, Protocol> =
            parse(&self.id, "protocolos_ensayos", &self.protocolos_ensayos)?;
        let calculos_cortocircuito: JsonValue = parse(
            &self.id,
            "calculos_cortocircuito",
            &self.calculos_cortocircuito,
        )?;
        let metadata: JsonValue = parse(&self.id, "metadata", &self.metadata)?;

        Ok(Project {
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            project_type: self.project_type,
            status: self.status,
            client_name: self.client_name,
            client_email: self.client_email,
            client_phone: self.client_phone,
            location: self.location,
            client_logo_url: self.client_logo_url,
            tableros,
            calculation_data,
            protocolos_ensayos,
            calculos_cortocircuito,
            metadata,
            calculation_count: self.calculation_count,
            protocolo_count: self.protocolo_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Create-project request body. Everything but `name` is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub project_type: String,
    pub status: Option<ProjectStatus>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub location: String,
    pub client_logo_url: String,
    pub tableros: Vec<PanelStub>,
    pub calculation_data: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
}

/// Append-only audit record. Removed only by project cascade-delete.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    pub id: i64,
    pub project_id: String,
    pub user_id: String,
    pub activity_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Count entries of a denormalized calculation document. The counter is
/// derived on write and never re-validated afterwards.
pub fn count_entries(value: &JsonValue) -> i64 {
    match value {
        JsonValue::Object(map) => map.len() as i64,
        JsonValue::Array(items) => items.len() as i64,
        JsonValue::Null => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_lowercase() {
        let v = serde_json::to_value(ProjectStatus::Active).unwrap();
        assert_eq!(v, serde_json::json!("active"));
        let s: ProjectStatus = serde_json::from_value(serde_json::json!("archived")).unwrap();
        assert_eq!(s, ProjectStatus::Archived);
    }

    #[test]
    fn corrupt_column_is_not_masked() {
        let row = ProjectRow {
            id: "p1".into(),
            name: "Tablero TG-01".into(),
            description: String::new(),
            owner_id: "alice".into(),
            project_type: String::new(),
            status: ProjectStatus::Draft,
            client_name: String::new(),
            client_email: String::new(),
            client_phone: String::new(),
            location: String::new(),
            client_logo_url: String::new(),
            tableros: "[]".into(),
            calculation_data: "not json".into(),
            protocolos_ensayos: "{}".into(),
            calculos_cortocircuito: "{}".into(),
            metadata: "{}".into(),
            calculation_count: 0,
            protocolo_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        match row.into_project() {
            Err(StoreError::CorruptColumn { column, .. }) => {
                assert_eq!(column, "calculation_data");
            }
            other => panic!("expected CorruptColumn, got {other:?}"),
        }
    }

    #[test]
    fn count_entries_by_shape() {
        assert_eq!(count_entries(&serde_json::json!({"a": 1, "b": 2})), 2);
        assert_eq!(count_entries(&serde_json::json!([1, 2, 3])), 3);
        assert_eq!(count_entries(&serde_json::json!(null)), 0);
        assert_eq!(count_entries(&serde_json::json!("x")), 1);
    }
}
