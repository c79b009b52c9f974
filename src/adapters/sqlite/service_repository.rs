//! SQLite implementation of the ServiceRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{NotificationPrefs, ScopeFilter, Service};
use crate::domain::ports::ServiceRepository;

use super::{parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteServiceRepository {
    pool: SqlitePool,
}

impl SqliteServiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    group_id: String,
    name: String,
    description: String,
    routing_key: String,
    escalation_policy_id: Option<String>,
    notification_prefs: String,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ServiceRow> for Service {
    type Error = CoreError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let notification_prefs: NotificationPrefs =
            serde_json::from_str(&row.notification_prefs)?;
        Ok(Service {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            group_id: parse_uuid(&row.group_id, "group_id")?,
            name: row.name,
            description: row.description,
            routing_key: row.routing_key,
            escalation_policy_id: parse_opt_uuid(
                row.escalation_policy_id.as_deref(),
                "escalation_policy_id",
            )?,
            notification_prefs,
            is_active: row.is_active != 0,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[async_trait]
impl ServiceRepository for SqliteServiceRepository {
    async fn create(&self, service: &Service) -> CoreResult<()> {
        let prefs_json = serde_json::to_string(&service.notification_prefs)?;
        let result = sqlx::query(
            r#"INSERT INTO services (id, organization_id, project_id, group_id, name, description,
               routing_key, escalation_policy_id, notification_prefs, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(service.id.to_string())
        .bind(service.organization_id.to_string())
        .bind(service.project_id.map(|id| id.to_string()))
        .bind(service.group_id.to_string())
        .bind(&service.name)
        .bind(&service.description)
        .bind(&service.routing_key)
        .bind(service.escalation_policy_id.map(|id| id.to_string()))
        .bind(&prefs_json)
        .bind(i64::from(service.is_active))
        .bind(service.created_at.to_rfc3339())
        .bind(service.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                CoreError::ConflictState(format!("routing key in use: {}", service.routing_key)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Service>> {
        let row: Option<ServiceRow> = sqlx::query_as("SELECT * FROM services WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_routing_key(&self, routing_key: &str) -> CoreResult<Option<Service>> {
        let row: Option<ServiceRow> =
            sqlx::query_as("SELECT * FROM services WHERE routing_key = ? AND is_active = 1")
                .bind(routing_key)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, service: &Service) -> CoreResult<()> {
        let prefs_json = serde_json::to_string(&service.notification_prefs)?;
        let result = sqlx::query(
            r#"UPDATE services SET project_id = ?, group_id = ?, name = ?, description = ?,
               routing_key = ?, escalation_policy_id = ?, notification_prefs = ?, is_active = ?,
               updated_at = ?
               WHERE id = ?"#,
        )
        .bind(service.project_id.map(|id| id.to_string()))
        .bind(service.group_id.to_string())
        .bind(&service.name)
        .bind(&service.description)
        .bind(&service.routing_key)
        .bind(service.escalation_policy_id.map(|id| id.to_string()))
        .bind(&prefs_json)
        .bind(i64::from(service.is_active))
        .bind(Utc::now().to_rfc3339())
        .bind(service.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("service", service.id));
        }
        Ok(())
    }

    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Service>> {
        let mut query = String::from("SELECT * FROM services WHERE is_active = 1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);
        query.push_str(" ORDER BY name");

        let mut q = sqlx::query_as::<_, ServiceRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn deactivate(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("UPDATE services SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("service", id));
        }
        Ok(())
    }
}
