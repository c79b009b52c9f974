//! SQLite adapters: connection pool, migrations, and repository
//! implementations.

pub mod connection;
pub mod escalation_repository;
pub mod group_repository;
pub mod incident_repository;
pub mod integration_repository;
pub mod membership_repository;
pub mod migrations;
pub mod notification_queue;
pub mod schedule_repository;
pub mod service_repository;
pub mod user_repository;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use escalation_repository::SqliteEscalationRepository;
pub use group_repository::SqliteGroupRepository;
pub use incident_repository::SqliteIncidentRepository;
pub use integration_repository::SqliteIntegrationRepository;
pub use membership_repository::SqliteMembershipRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use notification_queue::SqliteNotificationQueue;
pub use schedule_repository::SqliteScheduleRepository;
pub use service_repository::SqliteServiceRepository;
pub use user_repository::SqliteUserRepository;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::CoreError;

/// Parse a stored UUID column.
pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid, CoreError> {
    Uuid::parse_str(value)
        .map_err(|_| CoreError::Serialization(format!("invalid uuid in column {column}: {value}")))
}

/// Parse an optional stored UUID column.
pub(crate) fn parse_opt_uuid(
    value: Option<&str>,
    column: &str,
) -> Result<Option<Uuid>, CoreError> {
    value.map(|v| parse_uuid(v, column)).transpose()
}

/// Parse a stored RFC3339 timestamp column.
pub(crate) fn parse_ts(value: &str, column: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            CoreError::Serialization(format!("invalid timestamp in column {column}: {value}"))
        })
}

/// Parse an optional stored RFC3339 timestamp column.
pub(crate) fn parse_opt_ts(
    value: Option<&str>,
    column: &str,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    value.map(|v| parse_ts(v, column)).transpose()
}
