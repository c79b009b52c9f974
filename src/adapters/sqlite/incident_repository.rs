//! SQLite implementation of the IncidentRepository.
//!
//! State changes, their audit events, and any queued notifications commit in
//! a single transaction, so notifications never become visible before the
//! incident row they describe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    EscalationStatus, Incident, IncidentEvent, IncidentEventType, IncidentStatus,
    NotificationMessage, ScopeFilter, Severity, Urgency,
};
use crate::domain::ports::incident_repository::{
    AssigneeFilter, IncidentFilter, IncidentRepository, IncidentStats,
};

use super::{parse_opt_ts, parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteIncidentRepository {
    pool: SqlitePool,
}

impl SqliteIncidentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_event_tx(
        tx: &mut Transaction<'_, Sqlite>,
        event: &IncidentEvent,
    ) -> CoreResult<()> {
        let data_json = serde_json::to_string(&event.event_data)?;
        sqlx::query(
            r#"INSERT INTO incident_events (id, incident_id, event_type, event_data,
               created_at, created_by)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id.to_string())
        .bind(event.incident_id.to_string())
        .bind(event.event_type.as_str())
        .bind(&data_json)
        .bind(event.created_at.to_rfc3339())
        .bind(&event.created_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_notification_tx(
        tx: &mut Transaction<'_, Sqlite>,
        message: &NotificationMessage,
    ) -> CoreResult<()> {
        let channels_json = serde_json::to_string(&message.channels)?;
        sqlx::query(
            r#"INSERT INTO incident_notifications (id, notification_type, user_id, incident_id,
               channels, priority, status, retry_count, visible_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.notification_type.as_str())
        .bind(message.user_id.to_string())
        .bind(message.incident_id.to_string())
        .bind(&channels_json)
        .bind(message.priority.as_str())
        .bind(message.status.as_str())
        .bind(i64::from(message.retry_count))
        .bind(message.visible_at.to_rfc3339())
        .bind(message.created_at.to_rfc3339())
        .bind(message.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn update_incident_tx(
        tx: &mut Transaction<'_, Sqlite>,
        incident: &Incident,
    ) -> CoreResult<()> {
        let labels_json = serde_json::to_string(&incident.labels)?;
        let custom_json = serde_json::to_string(&incident.custom_fields)?;
        let result = sqlx::query(
            r#"UPDATE incidents SET title = ?, description = ?, status = ?, severity = ?,
               urgency = ?, service_id = ?, group_id = ?, escalation_policy_id = ?,
               current_escalation_level = ?, escalation_status = ?, last_escalated_at = ?,
               incident_key = ?, labels = ?, custom_fields = ?, alert_count = ?,
               assigned_to = ?, assigned_at = ?, acknowledged_by = ?, acknowledged_at = ?,
               resolved_by = ?, resolved_at = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.status.as_str())
        .bind(incident.severity.as_str())
        .bind(incident.urgency.as_str())
        .bind(incident.service_id.map(|id| id.to_string()))
        .bind(incident.group_id.map(|id| id.to_string()))
        .bind(incident.escalation_policy_id.map(|id| id.to_string()))
        .bind(i64::from(incident.current_escalation_level))
        .bind(incident.escalation_status.as_str())
        .bind(incident.last_escalated_at.map(|t| t.to_rfc3339()))
        .bind(&incident.incident_key)
        .bind(&labels_json)
        .bind(&custom_json)
        .bind(i64::from(incident.alert_count))
        .bind(incident.assigned_to.map(|id| id.to_string()))
        .bind(incident.assigned_at.map(|t| t.to_rfc3339()))
        .bind(incident.acknowledged_by.map(|id| id.to_string()))
        .bind(incident.acknowledged_at.map(|t| t.to_rfc3339()))
        .bind(incident.resolved_by.map(|id| id.to_string()))
        .bind(incident.resolved_at.map(|t| t.to_rfc3339()))
        .bind(incident.updated_at.to_rfc3339())
        .bind(incident.id.to_string())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("incident", incident.id));
        }
        Ok(())
    }

    async fn fetch_open_one(
        &self,
        query: &str,
        bindings: &[String],
    ) -> CoreResult<Option<Incident>> {
        let mut q = sqlx::query_as::<_, IncidentRow>(query);
        for binding in bindings {
            q = q.bind(binding);
        }
        let row = q.fetch_optional(&self.pool).await?;
        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct IncidentRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    title: String,
    description: String,
    status: String,
    severity: String,
    urgency: String,
    source: String,
    service_id: Option<String>,
    group_id: Option<String>,
    escalation_policy_id: Option<String>,
    current_escalation_level: i64,
    escalation_status: String,
    last_escalated_at: Option<String>,
    incident_key: Option<String>,
    labels: String,
    custom_fields: String,
    alert_count: i64,
    assigned_to: Option<String>,
    assigned_at: Option<String>,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<String>,
    resolved_by: Option<String>,
    resolved_at: Option<String>,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = CoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let status = IncidentStatus::from_str(&row.status)
            .ok_or_else(|| CoreError::Serialization(format!("unknown status: {}", row.status)))?;
        let severity = Severity::from_str(&row.severity).ok_or_else(|| {
            CoreError::Serialization(format!("unknown severity: {}", row.severity))
        })?;
        let urgency = Urgency::from_str(&row.urgency)
            .ok_or_else(|| CoreError::Serialization(format!("unknown urgency: {}", row.urgency)))?;
        let escalation_status =
            EscalationStatus::from_str(&row.escalation_status).ok_or_else(|| {
                CoreError::Serialization(format!(
                    "unknown escalation_status: {}",
                    row.escalation_status
                ))
            })?;
        let labels: HashMap<String, String> = serde_json::from_str(&row.labels)?;
        let custom_fields: HashMap<String, serde_json::Value> =
            serde_json::from_str(&row.custom_fields)?;

        Ok(Incident {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            title: row.title,
            description: row.description,
            status,
            severity,
            urgency,
            source: row.source,
            service_id: parse_opt_uuid(row.service_id.as_deref(), "service_id")?,
            group_id: parse_opt_uuid(row.group_id.as_deref(), "group_id")?,
            escalation_policy_id: parse_opt_uuid(
                row.escalation_policy_id.as_deref(),
                "escalation_policy_id",
            )?,
            current_escalation_level: u32::try_from(row.current_escalation_level).unwrap_or(1),
            escalation_status,
            last_escalated_at: parse_opt_ts(row.last_escalated_at.as_deref(), "last_escalated_at")?,
            incident_key: row.incident_key,
            labels,
            custom_fields,
            alert_count: u32::try_from(row.alert_count).unwrap_or(1),
            assigned_to: parse_opt_uuid(row.assigned_to.as_deref(), "assigned_to")?,
            assigned_at: parse_opt_ts(row.assigned_at.as_deref(), "assigned_at")?,
            acknowledged_by: parse_opt_uuid(row.acknowledged_by.as_deref(), "acknowledged_by")?,
            acknowledged_at: parse_opt_ts(row.acknowledged_at.as_deref(), "acknowledged_at")?,
            resolved_by: parse_opt_uuid(row.resolved_by.as_deref(), "resolved_by")?,
            resolved_at: parse_opt_ts(row.resolved_at.as_deref(), "resolved_at")?,
            created_by: row.created_by,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    incident_id: String,
    event_type: String,
    event_data: String,
    created_at: String,
    created_by: Option<String>,
}

impl TryFrom<EventRow> for IncidentEvent {
    type Error = CoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = IncidentEventType::from_str(&row.event_type).ok_or_else(|| {
            CoreError::Serialization(format!("unknown event_type: {}", row.event_type))
        })?;
        Ok(IncidentEvent {
            id: parse_uuid(&row.id, "id")?,
            incident_id: parse_uuid(&row.incident_id, "incident_id")?,
            event_type,
            event_data: serde_json::from_str(&row.event_data)?,
            created_at: parse_ts(&row.created_at, "created_at")?,
            created_by: row.created_by,
        })
    }
}

#[async_trait]
impl IncidentRepository for SqliteIncidentRepository {
    async fn create_atomic(
        &self,
        incident: &Incident,
        events: &[IncidentEvent],
        notifications: &[NotificationMessage],
    ) -> CoreResult<()> {
        let labels_json = serde_json::to_string(&incident.labels)?;
        let custom_json = serde_json::to_string(&incident.custom_fields)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO incidents (id, organization_id, project_id, title, description,
               status, severity, urgency, source, service_id, group_id, escalation_policy_id,
               current_escalation_level, escalation_status, last_escalated_at, incident_key,
               labels, custom_fields, alert_count, assigned_to, assigned_at, acknowledged_by,
               acknowledged_at, resolved_by, resolved_at, created_by, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(incident.id.to_string())
        .bind(incident.organization_id.to_string())
        .bind(incident.project_id.map(|id| id.to_string()))
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.status.as_str())
        .bind(incident.severity.as_str())
        .bind(incident.urgency.as_str())
        .bind(&incident.source)
        .bind(incident.service_id.map(|id| id.to_string()))
        .bind(incident.group_id.map(|id| id.to_string()))
        .bind(incident.escalation_policy_id.map(|id| id.to_string()))
        .bind(i64::from(incident.current_escalation_level))
        .bind(incident.escalation_status.as_str())
        .bind(incident.last_escalated_at.map(|t| t.to_rfc3339()))
        .bind(&incident.incident_key)
        .bind(&labels_json)
        .bind(&custom_json)
        .bind(i64::from(incident.alert_count))
        .bind(incident.assigned_to.map(|id| id.to_string()))
        .bind(incident.assigned_at.map(|t| t.to_rfc3339()))
        .bind(incident.acknowledged_by.map(|id| id.to_string()))
        .bind(incident.acknowledged_at.map(|t| t.to_rfc3339()))
        .bind(incident.resolved_by.map(|id| id.to_string()))
        .bind(incident.resolved_at.map(|t| t.to_rfc3339()))
        .bind(&incident.created_by)
        .bind(incident.created_at.to_rfc3339())
        .bind(incident.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for event in events {
            Self::insert_event_tx(&mut tx, event).await?;
        }
        for message in notifications {
            Self::insert_notification_tx(&mut tx, message).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Incident>> {
        let row: Option<IncidentRow> = sqlx::query_as("SELECT * FROM incidents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_with_events(
        &self,
        incident: &Incident,
        events: &[IncidentEvent],
        notifications: &[NotificationMessage],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::update_incident_tx(&mut tx, incident).await?;
        for event in events {
            Self::insert_event_tx(&mut tx, event).await?;
        }
        for message in notifications {
            Self::insert_notification_tx(&mut tx, message).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_refire(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE incidents SET alert_count = alert_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("incident", id));
        }
        Ok(())
    }

    async fn list(
        &self,
        filter: &IncidentFilter,
        scope: &ScopeFilter,
    ) -> CoreResult<Vec<Incident>> {
        let mut query = String::from("SELECT * FROM incidents WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);

        if let Some(search) = &filter.search {
            query.push_str(" AND (title LIKE ? OR description LIKE ?)");
            let pattern = format!("%{search}%");
            bindings.push(pattern.clone());
            bindings.push(pattern);
        }
        if let Some(status) = filter.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(urgency) = filter.urgency {
            query.push_str(" AND urgency = ?");
            bindings.push(urgency.as_str().to_string());
        }
        if let Some(severity) = filter.severity {
            query.push_str(" AND severity = ?");
            bindings.push(severity.as_str().to_string());
        }
        match filter.assigned_to {
            AssigneeFilter::Any => {}
            AssigneeFilter::Unassigned => query.push_str(" AND assigned_to IS NULL"),
            AssigneeFilter::User(id) => {
                query.push_str(" AND assigned_to = ?");
                bindings.push(id.to_string());
            }
        }
        if let Some(service_id) = filter.service_id {
            query.push_str(" AND service_id = ?");
            bindings.push(service_id.to_string());
        }
        if let Some(group_id) = filter.group_id {
            query.push_str(" AND group_id = ?");
            bindings.push(group_id.to_string());
        }
        if let Some(cutoff) = filter.time_range.cutoff(Utc::now()) {
            query.push_str(" AND created_at >= ?");
            bindings.push(cutoff.to_rfc3339());
        }

        query.push_str(&format!(
            " ORDER BY {} LIMIT {} OFFSET {}",
            filter.sort.sql(),
            filter.effective_limit(),
            filter.offset()
        ));

        let mut q = sqlx::query_as::<_, IncidentRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_open_by_fingerprint(
        &self,
        organization_id: Uuid,
        fingerprint: &str,
    ) -> CoreResult<Option<Incident>> {
        self.fetch_open_one(
            r#"SELECT * FROM incidents
               WHERE organization_id = ?
                 AND json_extract(labels, '$.fingerprint') = ?
                 AND status IN ('triggered', 'acknowledged')
               ORDER BY created_at DESC LIMIT 1"#,
            &[organization_id.to_string(), fingerprint.to_string()],
        )
        .await
    }

    async fn find_open_by_labels(
        &self,
        organization_id: Uuid,
        alertname: &str,
        instance: &str,
        job: Option<&str>,
    ) -> CoreResult<Option<Incident>> {
        match job {
            Some(job) => {
                self.fetch_open_one(
                    r#"SELECT * FROM incidents
                       WHERE organization_id = ?
                         AND json_extract(labels, '$.alertname') = ?
                         AND json_extract(labels, '$.instance') = ?
                         AND json_extract(labels, '$.job') = ?
                         AND status IN ('triggered', 'acknowledged')
                       ORDER BY created_at DESC LIMIT 1"#,
                    &[
                        organization_id.to_string(),
                        alertname.to_string(),
                        instance.to_string(),
                        job.to_string(),
                    ],
                )
                .await
            }
            None => {
                self.fetch_open_one(
                    r#"SELECT * FROM incidents
                       WHERE organization_id = ?
                         AND json_extract(labels, '$.alertname') = ?
                         AND json_extract(labels, '$.instance') = ?
                         AND status IN ('triggered', 'acknowledged')
                       ORDER BY created_at DESC LIMIT 1"#,
                    &[
                        organization_id.to_string(),
                        alertname.to_string(),
                        instance.to_string(),
                    ],
                )
                .await
            }
        }
    }

    async fn find_open_by_title(
        &self,
        organization_id: Uuid,
        title: &str,
    ) -> CoreResult<Option<Incident>> {
        self.fetch_open_one(
            r#"SELECT * FROM incidents
               WHERE organization_id = ? AND title = ?
                 AND status IN ('triggered', 'acknowledged')
               ORDER BY created_at DESC LIMIT 1"#,
            &[organization_id.to_string(), title.to_string()],
        )
        .await
    }

    async fn find_open_by_incident_key(
        &self,
        organization_id: Uuid,
        incident_key: &str,
    ) -> CoreResult<Option<Incident>> {
        self.fetch_open_one(
            r#"SELECT * FROM incidents
               WHERE organization_id = ? AND incident_key = ?
                 AND status IN ('triggered', 'acknowledged')
               ORDER BY created_at DESC LIMIT 1"#,
            &[organization_id.to_string(), incident_key.to_string()],
        )
        .await
    }

    async fn append_event(&self, event: &IncidentEvent) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_events(
        &self,
        incident_id: Uuid,
        limit: u32,
    ) -> CoreResult<Vec<IncidentEvent>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT * FROM incident_events WHERE incident_id = ? ORDER BY created_at ASC, rowid ASC LIMIT ?",
        )
        .bind(incident_id.to_string())
        .bind(i64::from(limit.min(100)))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_escalation_candidates(&self, limit: u32) -> CoreResult<Vec<Incident>> {
        let rows: Vec<IncidentRow> = sqlx::query_as(
            r#"SELECT * FROM incidents
               WHERE status IN ('triggered', 'acknowledged')
                 AND escalation_policy_id IS NOT NULL
                 AND escalation_status IN ('none', 'pending')
               ORDER BY created_at ASC LIMIT ?"#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn stats(
        &self,
        scope: &ScopeFilter,
        since: DateTime<Utc>,
    ) -> CoreResult<IncidentStats> {
        let mut base = String::from("SELECT status, severity FROM incidents WHERE created_at >= ?");
        let mut bindings: Vec<String> = vec![since.to_rfc3339()];
        scope.push_sql(&mut base, &mut bindings);

        let mut q = sqlx::query_as::<_, (String, String)>(&base);
        for binding in &bindings {
            q = q.bind(binding);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut stats = IncidentStats { total: rows.len() as u64, ..Default::default() };
        for (status, severity) in rows {
            match status.as_str() {
                "triggered" => stats.triggered += 1,
                "acknowledged" => stats.acknowledged += 1,
                "resolved" => stats.resolved += 1,
                _ => {}
            }
            *stats.by_severity.entry(severity).or_insert(0) += 1;
        }

        let mut mtta_query = String::from(
            "SELECT AVG((julianday(acknowledged_at) - julianday(created_at)) * 86400.0) \
             FROM incidents WHERE created_at >= ? AND acknowledged_at IS NOT NULL",
        );
        let mut mtta_bindings: Vec<String> = vec![since.to_rfc3339()];
        scope.push_sql(&mut mtta_query, &mut mtta_bindings);
        let mut q = sqlx::query_as::<_, (Option<f64>,)>(&mtta_query);
        for binding in &mtta_bindings {
            q = q.bind(binding);
        }
        stats.mean_seconds_to_acknowledge = q.fetch_one(&self.pool).await?.0;

        let mut mttr_query = String::from(
            "SELECT AVG((julianday(resolved_at) - julianday(created_at)) * 86400.0) \
             FROM incidents WHERE created_at >= ? AND resolved_at IS NOT NULL",
        );
        let mut mttr_bindings: Vec<String> = vec![since.to_rfc3339()];
        scope.push_sql(&mut mttr_query, &mut mttr_bindings);
        let mut q = sqlx::query_as::<_, (Option<f64>,)>(&mttr_query);
        for binding in &mttr_bindings {
            q = q.bind(binding);
        }
        stats.mean_seconds_to_resolve = q.fetch_one(&self.pool).await?.0;

        Ok(stats)
    }
}
