//! SQLite implementation of the GroupRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{EscalationMethod, Group, ScopeFilter, Visibility};
use crate::domain::ports::GroupRepository;

use super::{parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteGroupRepository {
    pool: SqlitePool,
}

impl SqliteGroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    name: String,
    description: String,
    visibility: String,
    escalation_method: String,
    escalation_timeout: i64,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<GroupRow> for Group {
    type Error = CoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let visibility = Visibility::from_str(&row.visibility).ok_or_else(|| {
            CoreError::Serialization(format!("unknown visibility: {}", row.visibility))
        })?;
        let escalation_method =
            EscalationMethod::from_str(&row.escalation_method).ok_or_else(|| {
                CoreError::Serialization(format!(
                    "unknown escalation_method: {}",
                    row.escalation_method
                ))
            })?;
        Ok(Group {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            name: row.name,
            description: row.description,
            visibility,
            escalation_method,
            escalation_timeout: u32::try_from(row.escalation_timeout).unwrap_or(300),
            is_active: row.is_active != 0,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[async_trait]
impl GroupRepository for SqliteGroupRepository {
    async fn create(&self, group: &Group) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO groups (id, organization_id, project_id, name, description,
               visibility, escalation_method, escalation_timeout, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(group.id.to_string())
        .bind(group.organization_id.to_string())
        .bind(group.project_id.map(|id| id.to_string()))
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.visibility.as_str())
        .bind(group.escalation_method.as_str())
        .bind(i64::from(group.escalation_timeout))
        .bind(i64::from(group.is_active))
        .bind(group.created_at.to_rfc3339())
        .bind(group.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Group>> {
        let row: Option<GroupRow> = sqlx::query_as("SELECT * FROM groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, group: &Group) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE groups SET project_id = ?, name = ?, description = ?, visibility = ?,
               escalation_method = ?, escalation_timeout = ?, is_active = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(group.project_id.map(|id| id.to_string()))
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.visibility.as_str())
        .bind(group.escalation_method.as_str())
        .bind(i64::from(group.escalation_timeout))
        .bind(i64::from(group.is_active))
        .bind(Utc::now().to_rfc3339())
        .bind(group.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("group", group.id));
        }
        Ok(())
    }

    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Group>> {
        let mut query = String::from("SELECT * FROM groups WHERE is_active = 1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);
        query.push_str(" ORDER BY name");

        let mut q = sqlx::query_as::<_, GroupRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn deactivate(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("UPDATE groups SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("group", id));
        }
        Ok(())
    }
}
