//! Application services.

pub mod access_control;
pub mod escalation_service;
pub mod escalation_timer;
pub mod incident_service;
pub mod ingest;
pub mod notification_dispatcher;
pub mod routing_service;
pub mod schedule_service;

pub use access_control::AccessControl;
pub use escalation_service::EscalationService;
pub use escalation_timer::EscalationTimer;
pub use incident_service::{coerce_uuid_field, EscalationOutcome, IncidentService};
pub use ingest::{IngestPipeline, IngestReport};
pub use notification_dispatcher::NotificationDispatcher;
pub use routing_service::RoutingService;
pub use schedule_service::ScheduleService;
