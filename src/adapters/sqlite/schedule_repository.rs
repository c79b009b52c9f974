//! SQLite implementation of the ScheduleRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    EffectiveShift, OverrideType, RotationType, ScheduleOverride, ScheduleScope, Scheduler,
    ScopeFilter, Shift,
};
use crate::domain::ports::{OnCallScope, ScheduleRepository};

use super::{parse_opt_uuid, parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_shift_tx(
        tx: &mut Transaction<'_, Sqlite>,
        shift: &Shift,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO shifts (id, scheduler_id, user_id, start_time, end_time,
               rotation_days, is_recurring, service_id, schedule_scope, is_active,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(shift.id.to_string())
        .bind(shift.scheduler_id.to_string())
        .bind(shift.user_id.to_string())
        .bind(shift.start_time.to_rfc3339())
        .bind(shift.end_time.to_rfc3339())
        .bind(i64::from(shift.rotation_days))
        .bind(i64::from(shift.is_recurring))
        .bind(shift.service_id.map(|id| id.to_string()))
        .bind(shift.schedule_scope.as_str())
        .bind(i64::from(shift.is_active))
        .bind(shift.created_at.to_rfc3339())
        .bind(shift.updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SchedulerRow {
    id: String,
    organization_id: String,
    project_id: Option<String>,
    group_id: String,
    name: String,
    display_name: String,
    rotation_type: String,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SchedulerRow> for Scheduler {
    type Error = CoreError;

    fn try_from(row: SchedulerRow) -> Result<Self, Self::Error> {
        let rotation_type = RotationType::from_str(&row.rotation_type).ok_or_else(|| {
            CoreError::Serialization(format!("unknown rotation_type: {}", row.rotation_type))
        })?;
        Ok(Scheduler {
            id: parse_uuid(&row.id, "id")?,
            organization_id: parse_uuid(&row.organization_id, "organization_id")?,
            project_id: parse_opt_uuid(row.project_id.as_deref(), "project_id")?,
            group_id: parse_uuid(&row.group_id, "group_id")?,
            name: row.name,
            display_name: row.display_name,
            rotation_type,
            is_active: row.is_active != 0,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ShiftRow {
    id: String,
    scheduler_id: String,
    user_id: String,
    start_time: String,
    end_time: String,
    rotation_days: i64,
    is_recurring: i64,
    service_id: Option<String>,
    schedule_scope: String,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = CoreError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        let schedule_scope = ScheduleScope::from_str(&row.schedule_scope).ok_or_else(|| {
            CoreError::Serialization(format!("unknown schedule_scope: {}", row.schedule_scope))
        })?;
        Ok(Shift {
            id: parse_uuid(&row.id, "id")?,
            scheduler_id: parse_uuid(&row.scheduler_id, "scheduler_id")?,
            user_id: parse_uuid(&row.user_id, "user_id")?,
            start_time: parse_ts(&row.start_time, "start_time")?,
            end_time: parse_ts(&row.end_time, "end_time")?,
            rotation_days: u32::try_from(row.rotation_days).unwrap_or(7),
            is_recurring: row.is_recurring != 0,
            service_id: parse_opt_uuid(row.service_id.as_deref(), "service_id")?,
            schedule_scope,
            is_active: row.is_active != 0,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OverrideRow {
    id: String,
    original_schedule_id: String,
    new_user_id: String,
    override_start_time: String,
    override_end_time: String,
    override_type: String,
    reason: String,
    created_at: String,
}

impl TryFrom<OverrideRow> for ScheduleOverride {
    type Error = CoreError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        let override_type = OverrideType::from_str(&row.override_type).ok_or_else(|| {
            CoreError::Serialization(format!("unknown override_type: {}", row.override_type))
        })?;
        Ok(ScheduleOverride {
            id: parse_uuid(&row.id, "id")?,
            original_schedule_id: parse_uuid(&row.original_schedule_id, "original_schedule_id")?,
            new_user_id: parse_uuid(&row.new_user_id, "new_user_id")?,
            override_start_time: parse_ts(&row.override_start_time, "override_start_time")?,
            override_end_time: parse_ts(&row.override_end_time, "override_end_time")?,
            override_type,
            reason: row.reason,
            created_at: parse_ts(&row.created_at, "created_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EffectiveShiftRow {
    shift_id: String,
    scheduler_id: String,
    group_id: String,
    service_id: Option<String>,
    start_time: String,
    end_time: String,
    effective_user_id: String,
    original_user_id: String,
    override_id: Option<String>,
}

impl TryFrom<EffectiveShiftRow> for EffectiveShift {
    type Error = CoreError;

    fn try_from(row: EffectiveShiftRow) -> Result<Self, Self::Error> {
        Ok(EffectiveShift {
            shift_id: parse_uuid(&row.shift_id, "shift_id")?,
            scheduler_id: parse_uuid(&row.scheduler_id, "scheduler_id")?,
            group_id: parse_uuid(&row.group_id, "group_id")?,
            service_id: parse_opt_uuid(row.service_id.as_deref(), "service_id")?,
            start_time: parse_ts(&row.start_time, "start_time")?,
            end_time: parse_ts(&row.end_time, "end_time")?,
            effective_user_id: parse_uuid(&row.effective_user_id, "effective_user_id")?,
            original_user_id: parse_uuid(&row.original_user_id, "original_user_id")?,
            override_id: parse_opt_uuid(row.override_id.as_deref(), "override_id")?,
        })
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn create_scheduler_with_shifts(
        &self,
        scheduler: &Scheduler,
        shifts: &[Shift],
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO schedulers (id, organization_id, project_id, group_id, name,
               display_name, rotation_type, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(scheduler.id.to_string())
        .bind(scheduler.organization_id.to_string())
        .bind(scheduler.project_id.map(|id| id.to_string()))
        .bind(scheduler.group_id.to_string())
        .bind(&scheduler.name)
        .bind(&scheduler.display_name)
        .bind(scheduler.rotation_type.as_str())
        .bind(i64::from(scheduler.is_active))
        .bind(scheduler.created_at.to_rfc3339())
        .bind(scheduler.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for shift in shifts {
            Self::insert_shift_tx(&mut tx, shift).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_scheduler(&self, id: Uuid) -> CoreResult<Option<Scheduler>> {
        let row: Option<SchedulerRow> = sqlx::query_as("SELECT * FROM schedulers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn find_scheduler_by_name(
        &self,
        group_id: Uuid,
        name: &str,
    ) -> CoreResult<Option<Scheduler>> {
        let row: Option<SchedulerRow> = sqlx::query_as(
            "SELECT * FROM schedulers WHERE group_id = ? AND name = ? AND is_active = 1",
        )
        .bind(group_id.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_schedulers(&self, scope: &ScopeFilter) -> CoreResult<Vec<Scheduler>> {
        let mut query = String::from("SELECT * FROM schedulers WHERE is_active = 1");
        let mut bindings: Vec<String> = Vec::new();
        scope.push_sql(&mut query, &mut bindings);
        query.push_str(" ORDER BY name");

        let mut q = sqlx::query_as::<_, SchedulerRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn deactivate_scheduler(&self, id: Uuid) -> CoreResult<()> {
        let result =
            sqlx::query("UPDATE schedulers SET is_active = 0, updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("scheduler", id));
        }
        Ok(())
    }

    async fn replace_shifts(&self, scheduler_id: Uuid, shifts: &[Shift]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE shifts SET is_active = 0, updated_at = ? WHERE scheduler_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(scheduler_id.to_string())
            .execute(&mut *tx)
            .await?;

        for shift in shifts {
            Self::insert_shift_tx(&mut tx, shift).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_shifts(&self, scheduler_id: Uuid) -> CoreResult<Vec<Shift>> {
        let rows: Vec<ShiftRow> = sqlx::query_as(
            "SELECT * FROM shifts WHERE scheduler_id = ? AND is_active = 1 ORDER BY start_time",
        )
        .bind(scheduler_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_shift(&self, id: Uuid) -> CoreResult<Option<Shift>> {
        let row: Option<ShiftRow> = sqlx::query_as("SELECT * FROM shifts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn create_override(&self, ov: &ScheduleOverride) -> CoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO schedule_overrides (id, original_schedule_id, new_user_id,
               override_start_time, override_end_time, override_type, reason, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(ov.id.to_string())
        .bind(ov.original_schedule_id.to_string())
        .bind(ov.new_user_id.to_string())
        .bind(ov.override_start_time.to_rfc3339())
        .bind(ov.override_end_time.to_rfc3339())
        .bind(ov.override_type.as_str())
        .bind(&ov.reason)
        .bind(ov.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::ConflictState(format!(
                    "shift {} already has an override",
                    ov.original_schedule_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_override(&self, id: Uuid) -> CoreResult<Option<ScheduleOverride>> {
        let row: Option<OverrideRow> =
            sqlx::query_as("SELECT * FROM schedule_overrides WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_override_for_shift(
        &self,
        shift_id: Uuid,
    ) -> CoreResult<Option<ScheduleOverride>> {
        let row: Option<OverrideRow> =
            sqlx::query_as("SELECT * FROM schedule_overrides WHERE original_schedule_id = ?")
                .bind(shift_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn delete_override(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM schedule_overrides WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("schedule override", id));
        }
        Ok(())
    }

    async fn effective_at(
        &self,
        scope: OnCallScope,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<EffectiveShift>> {
        let (clause, id) = match scope {
            OnCallScope::Group(id) => ("group_id = ?", id),
            OnCallScope::Scheduler(id) => ("scheduler_id = ?", id),
            OnCallScope::Service(id) => ("service_id = ?", id),
        };
        // Override rows sort first so a boundary-equal base row never wins.
        let query = format!(
            "SELECT * FROM effective_shifts WHERE {clause} AND start_time <= ? AND end_time > ? \
             ORDER BY (override_id IS NULL), start_time LIMIT 1"
        );

        let row: Option<EffectiveShiftRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .bind(at.to_rfc3339())
            .bind(at.to_rfc3339())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}
