//! Aggregate statistics over projects and activities.
//!
//! Dashboard numbers are scoped to the caller's projects; system totals
//! span the whole store. All of it is grouped SQL, no in-memory
//! aggregation beyond assembling the response.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_projects: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub active_last_30_days: i64,
    pub monthly_trend: Vec<MonthlyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_projects: i64,
    pub total_activities: i64,
    pub distinct_owners: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct StatsRepository {
    pool: SqlitePool,
}

impl StatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Caller-scoped dashboard aggregates.
    pub async fn dashboard(&self, owner: &str) -> Result<DashboardStats, StoreError> {
        let (total_projects,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM projects WHERE owner_id = ?")
                .bind(owner)
                .fetch_one(&self.pool)
                .await?;

        let by_status = self
            .grouped_counts("status", owner)
            .await?;
        let by_type = self
            .grouped_counts("project_type", owner)
            .await?;

        let thirty_days_ago = Utc::now() - Duration::days(30);
        let (active_last_30_days,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM projects WHERE owner_id = ? AND updated_at >= ?",
        )
        .bind(owner)
        .bind(thirty_days_ago)
        .fetch_one(&self.pool)
        .await?;

        let six_months_ago = Utc::now() - Duration::days(180);
        let monthly: Vec<(String, i64)> = sqlx::query_as(
            "SELECT strftime('%Y-%m', created_at) AS month, COUNT(*) \
             FROM projects WHERE owner_id = ? AND created_at >= ? \
             GROUP BY month ORDER BY month",
        )
        .bind(owner)
        .bind(six_months_ago)
        .fetch_all(&self.pool)
        .await?;

        Ok(DashboardStats {
            total_projects,
            by_status,
            by_type,
            active_last_30_days,
            monthly_trend: monthly
                .into_iter()
                .map(|(month, count)| MonthlyCount { month, count })
                .collect(),
        })
    }

    /// Store-wide totals.
    pub async fn system(&self) -> Result<SystemStats, StoreError> {
        let (total_projects,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        let (total_activities,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM project_activities")
                .fetch_one(&self.pool)
                .await?;
        let (distinct_owners,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT owner_id) FROM projects")
                .fetch_one(&self.pool)
                .await?;

        Ok(SystemStats {
            total_projects,
            total_activities,
            distinct_owners,
        })
    }

    /// The caller's most recently updated projects.
    pub async fn recent_projects(
        &self,
        owner: &str,
        limit: i64,
    ) -> Result<Vec<ProjectSummary>, StoreError> {
        let rows = sqlx::query_as::<_, ProjectSummary>(
            "SELECT id, name, status, updated_at FROM projects \
             WHERE owner_id = ? ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn grouped_counts(
        &self,
        column: &'static str,
        owner: &str,
    ) -> Result<BTreeMap<String, i64>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT {column}, COUNT(*) FROM projects WHERE owner_id = ? GROUP BY {column}"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
