//! Ports: interfaces between the domain and the adapters.

pub mod escalation_repository;
pub mod group_repository;
pub mod incident_repository;
pub mod integration_repository;
pub mod membership_repository;
pub mod notification_queue;
pub mod notifier;
pub mod schedule_repository;
pub mod service_repository;
pub mod token_verifier;
pub mod user_repository;

pub use escalation_repository::EscalationRepository;
pub use group_repository::GroupRepository;
pub use incident_repository::{
    AssigneeFilter, IncidentFilter, IncidentRepository, IncidentStats, SortOrder, TimeRange,
};
pub use integration_repository::IntegrationRepository;
pub use membership_repository::MembershipRepository;
pub use notification_queue::NotificationQueue;
pub use notifier::Notifier;
pub use schedule_repository::{OnCallScope, ScheduleRepository};
pub use service_repository::ServiceRepository;
pub use token_verifier::{AuthUser, TokenVerifier};
pub use user_repository::UserRepository;
