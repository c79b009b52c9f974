//! Domain models.

pub mod alert;
pub mod config;
pub mod escalation;
pub mod group;
pub mod incident;
pub mod integration;
pub mod membership;
pub mod notification;
pub mod schedule;
pub mod service;
pub mod user;

pub use alert::{AlertStatus, ProcessedAlert};
pub use config::{Config, EscalationConfig, HttpConfig, IngestConfig, LoggingConfig, NotifierConfig};
pub use escalation::{validate_levels, EscalationLevel, EscalationPolicy, EscalationTarget};
pub use group::{EscalationMethod, Group, Visibility};
pub use incident::{
    EscalationStatus, Incident, IncidentEvent, IncidentEventType, IncidentStatus, Severity,
    Urgency, FINGERPRINT_LABEL,
};
pub use integration::{
    HealthStatus, Integration, IntegrationType, RoutingConditions, ServiceIntegration,
};
pub use membership::{Membership, ResourceType, ScopeFilter};
pub use notification::{
    NotificationChannel, NotificationMessage, NotificationPriority, NotificationStatus,
    NotificationType,
};
pub use schedule::{
    effective_intervals, effective_user_at, EffectiveShift, OverrideType, RotationType,
    ScheduleOverride, ScheduleScope, Scheduler, Shift,
};
pub use service::{NotificationPrefs, Service};
pub use user::{DeviceToken, User};
