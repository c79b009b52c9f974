//! SQLite implementation of the EscalationRepository.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    EscalationLevel, EscalationPolicy, EscalationTarget, ScopeFilter,
};
use crate::domain::ports::EscalationRepository;

use super::{parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteEscalationRepository {
    pool: SqlitePool,
}

impl SqliteEscalationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_level_tx(
        tx: &mut Transaction<'_, Sqlite>,
        level: &EscalationLevel,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO escalation_levels (id, policy_id, level_number, target_type,
               target_id, timeout_minutes)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(level.id.to_string())
        .bind(level.policy_id.to_string())
        .bind(i64::from(level.level_number))
        .bind(level.target.target_type())
        .bind(level.target.target_id().map(|id| id.to_string()))
        .bind(i64::from(level.timeout_minutes))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PolicyRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    group_id: Option<String>,
    name: String,
    description: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PolicyRow> for EscalationPolicy {
    type Error = CoreError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(EscalationPolicy {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            group_id: parse_opt_uuid(row.group_id.as_deref(), "group_id")?,
            name: row.name,
            description: row.description,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LevelRow {
    id: String,
    policy_id: String,
    level_number: i64,
    target_type: String,
    target_id: Option<String>,
    timeout_minutes: i64,
}

impl TryFrom<LevelRow> for EscalationLevel {
    type Error = CoreError;

    fn try_from(row: LevelRow) -> Result<Self, Self::Error> {
        let target_id = parse_opt_uuid(row.target_id.as_deref(), "target_id")?;
        let target = EscalationTarget::from_parts(&row.target_type, target_id).ok_or_else(|| {
            CoreError::Serialization(format!(
                "invalid escalation target: {} / {:?}",
                row.target_type, row.target_id
            ))
        })?;
        Ok(EscalationLevel {
            id: parse_uuid(&row.id, "id")?,
            policy_id: parse_uuid(&row.policy_id, "policy_id")?,
            level_number: u32::try_from(row.level_number).map_err(|_| {
                CoreError::Serialization(format!("invalid level_number: {}", row.level_number))
            })?,
            target,
            timeout_minutes: u32::try_from(row.timeout_minutes).unwrap_or(30),
        })
    }
}

#[async_trait]
impl EscalationRepository for SqliteEscalationRepository {
    async fn create_policy_with_levels(
        &self,
        policy: &EscalationPolicy,
        levels: &[EscalationLevel],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO escalation_policies (id, organization_id, project_id, group_id,
               name, description, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(policy.id.to_string())
        .bind(policy.organization_id.to_string())
        .bind(policy.project_id.map(|id| id.to_string()))
        .bind(policy.group_id.map(|id| id.to_string()))
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(policy.created_at.to_rfc3339())
        .bind(policy.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for level in levels {
            Self::insert_level_tx(&mut tx, level).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_policy(&self, id: Uuid) -> CoreResult<Option<EscalationPolicy>> {
        let row: Option<PolicyRow> =
            sqlx::query_as("SELECT * FROM escalation_policies WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_policies(&self, scope: &ScopeFilter) -> CoreResult<Vec<EscalationPolicy>> {
        let mut query = String::from("SELECT * FROM escalation_policies WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);
        query.push_str(" ORDER BY name");

        let mut q = sqlx::query_as::<_, PolicyRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_levels(&self, policy_id: Uuid) -> CoreResult<Vec<EscalationLevel>> {
        let rows: Vec<LevelRow> = sqlx::query_as(
            "SELECT * FROM escalation_levels WHERE policy_id = ? ORDER BY level_number",
        )
        .bind(policy_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_level(
        &self,
        policy_id: Uuid,
        level_number: u32,
    ) -> CoreResult<Option<EscalationLevel>> {
        let row: Option<LevelRow> = sqlx::query_as(
            "SELECT * FROM escalation_levels WHERE policy_id = ? AND level_number = ?",
        )
        .bind(policy_id.to_string())
        .bind(i64::from(level_number))
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn replace_levels(
        &self,
        policy_id: Uuid,
        levels: &[EscalationLevel],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM escalation_levels WHERE policy_id = ?")
            .bind(policy_id.to_string())
            .execute(&mut *tx)
            .await?;

        for level in levels {
            Self::insert_level_tx(&mut tx, level).await?;
        }

        sqlx::query("UPDATE escalation_policies SET updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(policy_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_policy(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM escalation_policies WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("escalation policy", id));
        }
        Ok(())
    }
}
