#![allow(dead_code)]

pub mod database;

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use vigil::adapters::sqlite::{
    SqliteEscalationRepository, SqliteGroupRepository, SqliteIncidentRepository,
    SqliteIntegrationRepository, SqliteMembershipRepository, SqliteNotificationQueue,
    SqliteScheduleRepository, SqliteServiceRepository, SqliteUserRepository,
};
use vigil::domain::models::{
    EscalationLevel, EscalationPolicy, EscalationTarget, Group, Integration, IntegrationType,
    Scheduler, Service, ServiceIntegration, Shift, User,
};
use vigil::domain::ports::{
    EscalationRepository, GroupRepository, IncidentRepository, IntegrationRepository,
    MembershipRepository, NotificationQueue, ScheduleRepository, ServiceRepository,
    UserRepository,
};
use vigil::services::{
    AccessControl, EscalationService, IncidentService, IngestPipeline, RoutingService,
    ScheduleService,
};

/// A fully wired in-memory stack, mirroring the production composition.
pub struct TestEnv {
    pub pool: SqlitePool,
    pub memberships: Arc<dyn MembershipRepository>,
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub escalation_repo: Arc<dyn EscalationRepository>,
    pub incident_repo: Arc<dyn IncidentRepository>,
    pub queue: Arc<dyn NotificationQueue>,
    pub access: Arc<AccessControl>,
    pub schedule_service: Arc<ScheduleService>,
    pub escalation_service: Arc<EscalationService>,
    pub incident_service: Arc<IncidentService>,
    pub routing_service: Arc<RoutingService>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let pool = database::setup_test_db().await;

        let memberships: Arc<dyn MembershipRepository> =
            Arc::new(SqliteMembershipRepository::new(pool.clone()));
        let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool.clone()));
        let groups: Arc<dyn GroupRepository> = Arc::new(SqliteGroupRepository::new(pool.clone()));
        let services: Arc<dyn ServiceRepository> =
            Arc::new(SqliteServiceRepository::new(pool.clone()));
        let integrations: Arc<dyn IntegrationRepository> =
            Arc::new(SqliteIntegrationRepository::new(pool.clone()));
        let schedules: Arc<dyn ScheduleRepository> =
            Arc::new(SqliteScheduleRepository::new(pool.clone()));
        let escalation_repo: Arc<dyn EscalationRepository> =
            Arc::new(SqliteEscalationRepository::new(pool.clone()));
        let incident_repo: Arc<dyn IncidentRepository> =
            Arc::new(SqliteIncidentRepository::new(pool.clone()));
        let queue: Arc<dyn NotificationQueue> =
            Arc::new(SqliteNotificationQueue::new(pool.clone()));

        let access = Arc::new(AccessControl::new(memberships.clone()));
        let schedule_service = Arc::new(ScheduleService::new(schedules.clone()));
        let escalation_service =
            Arc::new(EscalationService::new(escalation_repo.clone(), schedules.clone()));
        let incident_service = Arc::new(IncidentService::new(
            incident_repo.clone(),
            users.clone(),
            escalation_service.clone(),
        ));
        let routing_service =
            Arc::new(RoutingService::new(integrations.clone(), services.clone()));

        Self {
            pool,
            memberships,
            users,
            groups,
            services,
            integrations,
            schedules,
            escalation_repo,
            incident_repo,
            queue,
            access,
            schedule_service,
            escalation_service,
            incident_service,
            routing_service,
        }
    }

    /// The ingestion pipeline over this environment.
    pub fn ingest(&self, fingerprint_dedup: bool) -> IngestPipeline {
        IngestPipeline::new(
            self.integrations.clone(),
            self.incident_repo.clone(),
            self.users.clone(),
            self.routing_service.clone(),
            self.escalation_service.clone(),
            self.incident_service.clone(),
            fingerprint_dedup,
        )
    }

    pub async fn seed_org(&self) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO organizations (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind("test-org")
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .expect("failed to seed organization");
        id
    }

    pub async fn seed_project(&self, org: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO projects (id, organization_id, name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(org.to_string())
        .bind("test-project")
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .expect("failed to seed project");
        id
    }

    pub async fn seed_user(&self, name: &str) -> User {
        let user = User::new(
            format!("provider|{name}"),
            format!("{name}@example.com"),
            name,
        );
        self.users.create(&user).await.expect("failed to seed user");
        user
    }

    pub async fn seed_group(&self, org: Uuid) -> Group {
        let group = Group::new(org, format!("group-{}", &Uuid::new_v4().to_string()[..8]));
        self.groups.create(&group).await.expect("failed to seed group");
        group
    }

    pub async fn seed_service(&self, org: Uuid, group: Uuid) -> Service {
        let service = Service::new(
            org,
            group,
            "checkout",
            format!("rk-{}", Uuid::new_v4()),
        );
        self.services.create(&service).await.expect("failed to seed service");
        service
    }

    pub async fn seed_integration(&self, org: Uuid, kind: IntegrationType) -> Integration {
        let integration = Integration::new(org, "monitoring", kind);
        self.integrations
            .create(&integration)
            .await
            .expect("failed to seed integration");
        integration
    }

    pub async fn link(&self, service: Uuid, integration: Uuid, priority: u32) -> ServiceIntegration {
        let link = ServiceIntegration::new(service, integration, priority);
        self.integrations.link_service(&link).await.expect("failed to link service");
        link
    }

    /// Policy with a single `user` level.
    pub async fn seed_user_policy(&self, org: Uuid, user: Uuid, timeout: u32) -> EscalationPolicy {
        let policy = EscalationPolicy::new(org, "p1");
        let levels = vec![
            EscalationLevel::new(policy.id, 1, EscalationTarget::User(user)).with_timeout(timeout),
        ];
        self.escalation_repo
            .create_policy_with_levels(&policy, &levels)
            .await
            .expect("failed to seed policy");
        policy
    }

    pub async fn seed_policy(
        &self,
        org: Uuid,
        levels: Vec<(EscalationTarget, u32)>,
    ) -> EscalationPolicy {
        let policy = EscalationPolicy::new(org, "policy");
        let levels: Vec<EscalationLevel> = levels
            .into_iter()
            .enumerate()
            .map(|(idx, (target, timeout))| {
                EscalationLevel::new(policy.id, (idx + 1) as u32, target).with_timeout(timeout)
            })
            .collect();
        self.escalation_repo
            .create_policy_with_levels(&policy, &levels)
            .await
            .expect("failed to seed policy");
        policy
    }

    /// A scheduler with one shift covering `[start, end)` for `user`.
    pub async fn seed_schedule(
        &self,
        org: Uuid,
        group: Uuid,
        user: Uuid,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> (Scheduler, Shift) {
        let scheduler = Scheduler::new(org, group, format!("rota-{}", Uuid::new_v4()), "Rota");
        let shift = Shift::new(scheduler.id, user, start, end);
        self.schedules
            .create_scheduler_with_shifts(&scheduler, std::slice::from_ref(&shift))
            .await
            .expect("failed to seed schedule");
        (scheduler, shift)
    }
}
