//! SQLite implementation of the IntegrationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    Integration, IntegrationType, RoutingConditions, ScopeFilter, ServiceIntegration,
};
use crate::domain::ports::IntegrationRepository;

use super::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteIntegrationRepository {
    pool: SqlitePool,
}

impl SqliteIntegrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct IntegrationRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    name: String,
    integration_type: String,
    config: String,
    webhook_secret: Option<String>,
    is_active: i64,
    last_heartbeat: Option<String>,
    heartbeat_interval: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = CoreError;

    fn try_from(row: IntegrationRow) -> Result<Self, Self::Error> {
        let integration_type =
            IntegrationType::from_str(&row.integration_type).ok_or_else(|| {
                CoreError::Serialization(format!(
                    "unknown integration type: {}",
                    row.integration_type
                ))
            })?;
        Ok(Integration {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            name: row.name,
            integration_type,
            config: serde_json::from_str(&row.config)?,
            webhook_secret: row.webhook_secret,
            is_active: row.is_active != 0,
            last_heartbeat: parse_opt_ts(row.last_heartbeat.as_deref(), "last_heartbeat")?,
            heartbeat_interval: u32::try_from(row.heartbeat_interval).unwrap_or(300),
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ServiceIntegrationRow {
    id: String,
    service_id: String,
    integration_id: String,
    routing_conditions: String,
    priority: i64,
    created_at: String,
}

impl TryFrom<ServiceIntegrationRow> for ServiceIntegration {
    type Error = CoreError;

    fn try_from(row: ServiceIntegrationRow) -> Result<Self, Self::Error> {
        let routing_conditions: RoutingConditions =
            serde_json::from_str(&row.routing_conditions)?;
        Ok(ServiceIntegration {
            id: parse_uuid(&row.id, "id")?,
            service_id: parse_uuid(&row.service_id, "service_id")?,
            integration_id: parse_uuid(&row.integration_id, "integration_id")?,
            routing_conditions,
            priority: u32::try_from(row.priority).unwrap_or(1000),
            created_at: parse_ts(&row.created_at, "created_at")?,
        })
    }
}

#[async_trait]
impl IntegrationRepository for SqliteIntegrationRepository {
    async fn create(&self, integration: &Integration) -> CoreResult<()> {
        let config_json = serde_json::to_string(&integration.config)?;
        sqlx::query(
            r#"INSERT INTO integrations (id, organization_id, project_id, name, integration_type,
               config, webhook_secret, is_active, last_heartbeat, heartbeat_interval,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(integration.id.to_string())
        .bind(integration.organization_id.to_string())
        .bind(integration.project_id.map(|id| id.to_string()))
        .bind(&integration.name)
        .bind(integration.integration_type.as_str())
        .bind(&config_json)
        .bind(&integration.webhook_secret)
        .bind(i64::from(integration.is_active))
        .bind(integration.last_heartbeat.map(|t| t.to_rfc3339()))
        .bind(i64::from(integration.heartbeat_interval))
        .bind(integration.created_at.to_rfc3339())
        .bind(integration.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Integration>> {
        let row: Option<IntegrationRow> =
            sqlx::query_as("SELECT * FROM integrations WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, integration: &Integration) -> CoreResult<()> {
        let config_json = serde_json::to_string(&integration.config)?;
        let result = sqlx::query(
            r#"UPDATE integrations SET project_id = ?, name = ?, integration_type = ?, config = ?,
               webhook_secret = ?, is_active = ?, heartbeat_interval = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(integration.project_id.map(|id| id.to_string()))
        .bind(&integration.name)
        .bind(integration.integration_type.as_str())
        .bind(&config_json)
        .bind(&integration.webhook_secret)
        .bind(i64::from(integration.is_active))
        .bind(i64::from(integration.heartbeat_interval))
        .bind(Utc::now().to_rfc3339())
        .bind(integration.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("integration", integration.id));
        }
        Ok(())
    }

    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Integration>> {
        let mut query = String::from("SELECT * FROM integrations WHERE is_active = 1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);
        query.push_str(" ORDER BY name");

        let mut q = sqlx::query_as::<_, IntegrationRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn deactivate(&self, id: Uuid) -> CoreResult<()> {
        let result =
            sqlx::query("UPDATE integrations SET is_active = 0, updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("integration", id));
        }
        Ok(())
    }

    async fn update_heartbeat(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE integrations SET last_heartbeat = ?, updated_at = ? WHERE id = ? AND is_active = 1",
        )
        .bind(at.to_rfc3339())
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn link_service(&self, link: &ServiceIntegration) -> CoreResult<()> {
        let conditions_json = serde_json::to_string(&link.routing_conditions)?;
        let result = sqlx::query(
            r#"INSERT INTO service_integrations (id, service_id, integration_id,
               routing_conditions, priority, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(link.id.to_string())
        .bind(link.service_id.to_string())
        .bind(link.integration_id.to_string())
        .bind(&conditions_json)
        .bind(i64::from(link.priority))
        .bind(link.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::ConflictState(format!(
                    "service {} already linked to integration {}",
                    link.service_id, link.integration_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn unlink_service(&self, service_id: Uuid, integration_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM service_integrations WHERE service_id = ? AND integration_id = ?",
        )
        .bind(service_id.to_string())
        .bind(integration_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("service integration", service_id));
        }
        Ok(())
    }

    async fn list_links(&self, integration_id: Uuid) -> CoreResult<Vec<ServiceIntegration>> {
        let rows: Vec<ServiceIntegrationRow> = sqlx::query_as(
            r#"SELECT * FROM service_integrations WHERE integration_id = ?
               ORDER BY priority ASC, created_at ASC"#,
        )
        .bind(integration_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
