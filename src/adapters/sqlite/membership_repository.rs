//! SQLite implementation of the MembershipRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Membership, ResourceType};
use crate::domain::ports::MembershipRepository;

use super::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: String,
    user_id: String,
    resource_type: String,
    resource_id: String,
    role: String,
    created_at: String,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = CoreError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let resource_type = ResourceType::from_str(&row.resource_type).ok_or_else(|| {
            CoreError::Serialization(format!("unknown resource_type: {}", row.resource_type))
        })?;
        Ok(Membership {
            id: parse_uuid(&row.id, "id")?,
            user_id: parse_uuid(&row.user_id, "user_id")?,
            resource_type,
            resource_id: parse_uuid(&row.resource_id, "resource_id")?,
            role: row.role,
            created_at: parse_ts(&row.created_at, "created_at")?,
        })
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn create(&self, membership: &Membership) -> CoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO memberships (id, user_id, resource_type, resource_id, role, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(membership.id.to_string())
        .bind(membership.user_id.to_string())
        .bind(membership.resource_type.as_str())
        .bind(membership.resource_id.to_string())
        .bind(&membership.role)
        .bind(membership.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::ConflictState(format!(
                    "membership already exists for user {} on {} {}",
                    membership.user_id,
                    membership.resource_type.as_str(),
                    membership.resource_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM memberships WHERE user_id = ? AND resource_type = ? AND resource_id = ?",
        )
        .bind(user_id.to_string())
        .bind(resource_type.as_str())
        .bind(resource_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("membership", resource_id));
        }
        Ok(())
    }

    async fn get(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<Option<Membership>> {
        let row: Option<MembershipRow> = sqlx::query_as(
            "SELECT * FROM memberships WHERE user_id = ? AND resource_type = ? AND resource_id = ?",
        )
        .bind(user_id.to_string())
        .bind(resource_type.as_str())
        .bind(resource_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_resource(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<Vec<Membership>> {
        let rows: Vec<MembershipRow> = sqlx::query_as(
            "SELECT * FROM memberships WHERE resource_type = ? AND resource_id = ? ORDER BY created_at",
        )
        .bind(resource_type.as_str())
        .bind(resource_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        resource_type: Option<ResourceType>,
    ) -> CoreResult<Vec<Membership>> {
        let rows: Vec<MembershipRow> = match resource_type {
            Some(rt) => {
                sqlx::query_as(
                    "SELECT * FROM memberships WHERE user_id = ? AND resource_type = ? ORDER BY created_at",
                )
                .bind(user_id.to_string())
                .bind(rt.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM memberships WHERE user_id = ? ORDER BY created_at")
                    .bind(user_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count_direct(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE resource_type = ? AND resource_id = ?",
        )
        .bind(resource_type.as_str())
        .bind(resource_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
