//! Sub-resource columns: calculations, short-circuit data and the
//! per-panel protocol map.
//!
//! PUT provisions a stub project when the target does not exist and
//! claims orphaned projects through an explicit compare-and-swap, so a
//! lost race is reported as Forbidden instead of being masked by a
//! last-write-wins overwrite. Reads never mutate the store; deletes
//! require existing ownership and never adopt an orphan.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::project::{count_entries, ORPHAN_OWNER};
use crate::models::protocol::Protocol;
use crate::templates;

/// Name given to projects auto-provisioned by a sub-resource PUT.
const STUB_PROJECT_NAME: &str = "New Project";

/// The three JSON sub-resource columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subresource {
    Calculations,
    Cortocircuito,
    Protocolos,
}

impl Subresource {
    fn column(&self) -> &'static str {
        match self {
            Subresource::Calculations => "calculation_data",
            Subresource::Cortocircuito => "calculos_cortocircuito",
            Subresource::Protocolos => "protocolos_ensayos",
        }
    }

    fn counter(&self) -> Option<&'static str> {
        match self {
            Subresource::Calculations => Some("calculation_count"),
            Subresource::Protocolos => Some("protocolo_count"),
            Subresource::Cortocircuito => None,
        }
    }

    fn activity(&self) -> &'static str {
        match self {
            Subresource::Calculations => "calculation_saved",
            Subresource::Cortocircuito => "cortocircuito_saved",
            Subresource::Protocolos => "protocolo_saved",
        }
    }

    fn empty_document(&self) -> &'static str {
        "{}"
    }
}

#[derive(Clone, Debug)]
pub struct SubresourceRepository {
    pool: SqlitePool,
}

impl SubresourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Ownership
    // ------------------------------------------------------------------

    /// Claim an orphaned project for `caller`. Single compare-and-swap;
    /// returns whether this caller won the claim.
    pub async fn claim_ownership(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE projects SET owner_id = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
        )
        .bind(caller)
        .bind(Utc::now())
        .bind(project_id)
        .bind(ORPHAN_OWNER)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() == 1;
        if won {
            self.log_activity(project_id, caller, "ownership_claimed", "Orphan project claimed")
                .await?;
            info!(project_id = %project_id, caller = %caller, "orphan project claimed");
        }
        Ok(won)
    }

    /// Read access: the project must exist and be owned by the caller or
    /// be an orphan. Never mutates anything.
    async fn ensure_readable(&self, project_id: &str, caller: &str) -> Result<(), StoreError> {
        match self.owner_of(project_id).await? {
            None => Err(StoreError::NotFound),
            Some(owner) if owner == caller || owner == ORPHAN_OWNER => Ok(()),
            Some(_) => Err(StoreError::Forbidden),
        }
    }

    /// Write access for PUT: provisions a stub when the project is
    /// missing, claims orphans via CAS, rejects foreign owners.
    async fn ensure_writable(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<(), StoreError> {
        match self.owner_of(project_id).await? {
            None => self.create_stub(project_id, caller).await,
            Some(owner) if owner == caller => Ok(()),
            Some(owner) if owner == ORPHAN_OWNER => {
                if self.claim_ownership(project_id, caller).await? {
                    Ok(())
                } else {
                    warn!(project_id = %project_id, caller = %caller, "lost ownership claim race");
                    Err(StoreError::Forbidden)
                }
            }
            Some(_) => Err(StoreError::Forbidden),
        }
    }

    /// Strict ownership for DELETE: the caller must already own the
    /// project. Orphans are not adopted and nothing is provisioned.
    async fn ensure_owned(&self, project_id: &str, caller: &str) -> Result<(), StoreError> {
        match self.owner_of(project_id).await? {
            None => Err(StoreError::NotFound),
            Some(owner) if owner == caller => Ok(()),
            Some(_) => Err(StoreError::Forbidden),
        }
    }

    async fn owner_of(&self, project_id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query_as::<_, (String,)>("SELECT owner_id FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(owner,)| owner))
    }

    async fn create_stub(&self, project_id: &str, caller: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO projects (id, name, owner_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(STUB_PROJECT_NAME)
        .bind(caller)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.log_activity(project_id, caller, "created", "Stub project provisioned")
            .await?;
        info!(project_id = %project_id, caller = %caller, "stub project provisioned");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw column access
    // ------------------------------------------------------------------

    async fn read_column(
        &self,
        sub: Subresource,
        project_id: &str,
        caller: &str,
    ) -> Result<String, StoreError> {
        self.ensure_readable(project_id, caller).await?;
        let (raw,): (String,) = sqlx::query_as(&format!(
            "SELECT {} FROM projects WHERE id = ?",
            sub.column()
        ))
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(raw)
    }

    async fn write_column(
        &self,
        sub: Subresource,
        project_id: &str,
        caller: &str,
        document: &str,
        count: Option<i64>,
    ) -> Result<(), StoreError> {
        let sql = match (sub.counter(), count) {
            (Some(counter), Some(_)) => format!(
                "UPDATE projects SET {} = ?, {counter} = ?, updated_at = ? WHERE id = ?",
                sub.column()
            ),
            _ => format!(
                "UPDATE projects SET {} = ?, updated_at = ? WHERE id = ?",
                sub.column()
            ),
        };

        let mut query = sqlx::query(&sql).bind(document);
        if let (Some(_), Some(n)) = (sub.counter(), count) {
            query = query.bind(n);
        }
        query
            .bind(Utc::now())
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        self.log_activity(project_id, caller, sub.activity(), "Sub-resource saved")
            .await?;
        Ok(())
    }

    async fn log_activity(
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

    // ------------------------------------------------------------------
    // Calculations / short-circuit (untyped JSON documents)
    // ------------------------------------------------------------------

    pub async fn get_calculations(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<JsonValue, StoreError> {
        self.get_json(Subresource::Calculations, project_id, caller)
            .await
    }

    pub async fn put_calculations(
        &self,
        project_id: &str,
        caller: &str,
        document: &JsonValue,
    ) -> Result<(), StoreError> {
        self.ensure_writable(project_id, caller).await?;
        self.write_column(
            Subresource::Calculations,
            project_id,
            caller,
            &document.to_string(),
            Some(count_entries(document)),
        )
        .await
    }

    pub async fn delete_calculations(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<(), StoreError> {
        self.reset(Subresource::Calculations, project_id, caller).await
    }

    pub async fn get_cortocircuito(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<JsonValue, StoreError> {
        self.get_json(Subresource::Cortocircuito, project_id, caller)
            .await
    }

    pub async fn put_cortocircuito(
        &self,
        project_id: &str,
        caller: &str,
        document: &JsonValue,
    ) -> Result<(), StoreError> {
        self.ensure_writable(project_id, caller).await?;
        self.write_column(
            Subresource::Cortocircuito,
            project_id,
            caller,
            &document.to_string(),
            None,
        )
        .await
    }

    pub async fn delete_cortocircuito(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<(), StoreError> {
        self.reset(Subresource::Cortocircuito, project_id, caller)
            .await
    }

    async fn get_json(
        &self,
        sub: Subresource,
        project_id: &str,
        caller: &str,
    ) -> Result<JsonValue, StoreError> {
        let raw = self.read_column(sub, project_id, caller).await?;
        serde_json::from_str(&raw).map_err(|source| StoreError::CorruptColumn {
            project_id: project_id.to_string(),
            column: sub.column(),
            source,
        })
    }

    async fn reset(
        &self,
        sub: Subresource,
        project_id: &str,
        caller: &str,
    ) -> Result<(), StoreError> {
        // No provisioning and no claim on delete.
        self.ensure_owned(project_id, caller).await?;
        self.write_column(
            sub,
            project_id,
            caller,
            sub.empty_document(),
            sub.counter().map(|_| 0),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Protocolos (typed, validated on both read and write)
    // ------------------------------------------------------------------

    /// Full protocol map for a project, validated against the typed
    /// document shape on read.
    pub async fn get_protocolos(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<BTreeMap<String, Protocol>, StoreError> {
        let raw = self
            .read_column(Subresource::Protocolos, project_id, caller)
            .await?;
        serde_json::from_str(&raw).map_err(|source| StoreError::CorruptColumn {
            project_id: project_id.to_string(),
            column: Subresource::Protocolos.column(),
            source,
        })
    }

    /// Replace the protocol map. Every protocol is normalized against the
    /// checklist template and its derived status recomputed before the
    /// write, so a client-supplied `estado` is never persisted as-is.
    pub async fn put_protocolos(
        &self,
        project_id: &str,
        caller: &str,
        protocolos: &BTreeMap<String, Protocol>,
    ) -> Result<BTreeMap<String, Protocol>, StoreError> {
        self.ensure_writable(project_id, caller).await?;

        let mut normalized = protocolos.clone();
        for protocol in normalized.values_mut() {
            templates::normalize(protocol);
        }

        self.write_column(
            Subresource::Protocolos,
            project_id,
            caller,
            &serde_json::to_string(&normalized)?,
            Some(normalized.len() as i64),
        )
        .await?;

        Ok(normalized)
    }

    pub async fn delete_protocolos(
        &self,
        project_id: &str,
        caller: &str,
    ) -> Result<(), StoreError> {
        self.reset(Subresource::Protocolos, project_id, caller).await
    }
}
