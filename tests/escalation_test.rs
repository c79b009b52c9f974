//! Escalation engine tests: assignee resolution, manual advances, and the
//! timer loop.

mod helpers;

use chrono::{Duration, Utc};
use uuid::Uuid;

use helpers::TestEnv;
use vigil::domain::errors::CoreError;
use vigil::domain::models::{
    EscalationStatus, EscalationTarget, Incident, IncidentEventType,
};
use vigil::domain::ports::{IncidentRepository, NotificationQueue};
use vigil::services::{EscalationOutcome, EscalationTimer};

#[tokio::test]
async fn test_resolve_assignee_user_target() {
    let env = TestEnv::new().await;
    let user = Uuid::new_v4();
    let resolved = env
        .escalation_service
        .resolve_assignee(EscalationTarget::User(user), None, Utc::now())
        .await
        .unwrap();
    assert_eq!(resolved, Some(user));
}

#[tokio::test]
async fn test_resolve_assignee_scheduler_and_current_schedule() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let user = env.seed_user("oncall").await;

    let now = Utc::now();
    let (scheduler, _) = env
        .seed_schedule(org, group.id, user.id, now - Duration::hours(1), now + Duration::hours(1))
        .await;

    let via_scheduler = env
        .escalation_service
        .resolve_assignee(EscalationTarget::Scheduler(scheduler.id), None, now)
        .await
        .unwrap();
    assert_eq!(via_scheduler, Some(user.id));

    let via_current = env
        .escalation_service
        .resolve_assignee(EscalationTarget::CurrentSchedule, Some(group.id), now)
        .await
        .unwrap();
    assert_eq!(via_current, Some(user.id));

    // Group target falls back to the incident's group when the target group
    // has no coverage.
    let via_group_fallback = env
        .escalation_service
        .resolve_assignee(EscalationTarget::Group(Uuid::new_v4()), Some(group.id), now)
        .await
        .unwrap();
    assert_eq!(via_group_fallback, Some(user.id));
}

#[tokio::test]
async fn test_resolve_assignee_empty_cases_are_none_not_errors() {
    let env = TestEnv::new().await;
    let now = Utc::now();

    assert_eq!(
        env.escalation_service
            .resolve_assignee(EscalationTarget::External(None), Some(Uuid::new_v4()), now)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        env.escalation_service
            .resolve_assignee(EscalationTarget::CurrentSchedule, None, now)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        env.escalation_service
            .resolve_assignee(EscalationTarget::Scheduler(Uuid::new_v4()), None, now)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn test_manual_escalate_preconditions() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let user = env.seed_user("alice").await;

    // No policy attached.
    let plain = env.incident_service.create(Incident::new(org, "a", "manual")).await.unwrap();
    let err = env.incident_service.escalate_manual(plain.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::ConflictState(_)));

    // Resolved incident.
    let policy = env.seed_user_policy(org, user.id, 30).await;
    let mut incident = Incident::new(org, "b", "manual");
    incident.escalation_policy_id = Some(policy.id);
    let incident = env.incident_service.create(incident).await.unwrap();
    env.incident_service.resolve(incident.id, user.id, None).await.unwrap();
    let err = env.incident_service.escalate_manual(incident.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::ConflictState(_)));

    // Single-level policy: no level 2 to advance to.
    let mut incident = Incident::new(org, "c", "manual");
    incident.escalation_policy_id = Some(policy.id);
    let incident = env.incident_service.create(incident).await.unwrap();
    let err = env.incident_service.escalate_manual(incident.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, CoreError::ConflictState(_)));
}

#[tokio::test]
async fn test_timer_advances_to_scheduler_target() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("level1").await;
    let u2 = env.seed_user("level2").await;

    let now = Utc::now();
    let (scheduler, _) = env
        .seed_schedule(org, group.id, u2.id, now - Duration::hours(1), now + Duration::hours(1))
        .await;

    // Level 1 pages u1 with a 15 minute timeout; level 2 pages whoever is on
    // the scheduler.
    let policy = env
        .seed_policy(
            org,
            vec![
                (EscalationTarget::User(u1.id), 15),
                (EscalationTarget::Scheduler(scheduler.id), 15),
            ],
        )
        .await;

    let mut incident = Incident::new(org, "hot", "prometheus");
    incident.escalation_policy_id = Some(policy.id);
    incident.group_id = Some(group.id);
    incident.assigned_to = Some(u1.id);
    incident.created_at = now - Duration::minutes(16);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();

    let timer = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        false,
    );
    let advanced = timer.tick().await.unwrap();
    assert_eq!(advanced, 1);

    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_escalation_level, 2);
    assert_eq!(refreshed.assigned_to, Some(u2.id));
    // Level 2 is the last level.
    assert_eq!(refreshed.escalation_status, EscalationStatus::Completed);
    assert!(refreshed.last_escalated_at.is_some());

    let events = env.incident_repo.list_events(incident.id, 50).await.unwrap();
    assert!(events.iter().any(|e| e.event_type == IncidentEventType::Escalated));
    assert!(events.iter().any(|e| e.event_type == IncidentEventType::EscalationCompleted));

    // The escalation notification targets the new assignee.
    let queued = env
        .queue
        .fetch_due(Utc::now() + Duration::seconds(1), 10)
        .await
        .unwrap();
    let escalated: Vec<_> = queued
        .iter()
        .filter(|m| m.notification_type.as_str() == "escalated")
        .collect();
    assert_eq!(escalated.len(), 1);
    assert_eq!(escalated[0].user_id, u2.id);
}

#[tokio::test]
async fn test_timer_marks_pending_when_further_levels_exist() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let u1 = env.seed_user("a").await;
    let u2 = env.seed_user("b").await;
    let u3 = env.seed_user("c").await;

    let policy = env
        .seed_policy(
            org,
            vec![
                (EscalationTarget::User(u1.id), 10),
                (EscalationTarget::User(u2.id), 10),
                (EscalationTarget::User(u3.id), 10),
            ],
        )
        .await;

    let mut incident = Incident::new(org, "hot", "manual");
    incident.escalation_policy_id = Some(policy.id);
    incident.created_at = Utc::now() - Duration::minutes(11);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();

    let timer = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        false,
    );
    timer.tick().await.unwrap();

    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_escalation_level, 2);
    assert_eq!(refreshed.assigned_to, Some(u2.id));
    assert_eq!(refreshed.escalation_status, EscalationStatus::Pending);
}

#[tokio::test]
async fn test_timer_respects_level_timeout() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let u1 = env.seed_user("a").await;
    let u2 = env.seed_user("b").await;

    let policy = env
        .seed_policy(
            org,
            vec![(EscalationTarget::User(u1.id), 30), (EscalationTarget::User(u2.id), 30)],
        )
        .await;

    // Only 5 minutes old: not due.
    let mut incident = Incident::new(org, "warm", "manual");
    incident.escalation_policy_id = Some(policy.id);
    incident.created_at = Utc::now() - Duration::minutes(5);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();

    let timer = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        false,
    );
    assert_eq!(timer.tick().await.unwrap(), 0);

    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_escalation_level, 1);
}

#[tokio::test]
async fn test_acknowledgement_halts_timer_escalation() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let u1 = env.seed_user("a").await;
    let u2 = env.seed_user("b").await;

    let policy = env
        .seed_policy(
            org,
            vec![(EscalationTarget::User(u1.id), 10), (EscalationTarget::User(u2.id), 10)],
        )
        .await;

    let mut incident = Incident::new(org, "hot", "manual");
    incident.escalation_policy_id = Some(policy.id);
    incident.created_at = Utc::now() - Duration::minutes(60);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();
    env.incident_service.acknowledge(incident.id, u1.id).await.unwrap();

    let halting = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        false,
    );
    assert_eq!(halting.tick().await.unwrap(), 0);
    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_escalation_level, 1);

    // With the policy flag on, acknowledged incidents keep escalating.
    let continuing = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        true,
    );
    assert_eq!(continuing.tick().await.unwrap(), 1);
    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.current_escalation_level, 2);
}

#[tokio::test]
async fn test_timer_exhausts_policy_and_stops() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let u1 = env.seed_user("a").await;

    let policy = env.seed_user_policy(org, u1.id, 10).await;

    let mut incident = Incident::new(org, "hot", "manual");
    incident.escalation_policy_id = Some(policy.id);
    incident.created_at = Utc::now() - Duration::minutes(60);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();

    // Only one level exists: the advance exhausts the policy.
    let outcome = env
        .incident_service
        .escalate_auto(incident.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, EscalationOutcome::Exhausted);

    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.escalation_status, EscalationStatus::Completed);

    // Completed incidents leave the scan set.
    let timer = EscalationTimer::new(
        env.incident_repo.clone(),
        env.escalation_repo.clone(),
        env.incident_service.clone(),
        false,
    );
    assert_eq!(timer.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn test_external_target_advances_without_assignee() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let u1 = env.seed_user("a").await;

    let policy = env
        .seed_policy(
            org,
            vec![
                (EscalationTarget::User(u1.id), 10),
                (EscalationTarget::External(None), 10),
            ],
        )
        .await;

    let mut incident = Incident::new(org, "hot", "manual");
    incident.escalation_policy_id = Some(policy.id);
    incident.assigned_to = Some(u1.id);
    incident.created_at = Utc::now() - Duration::minutes(11);
    incident.updated_at = incident.created_at;
    let incident = env.incident_service.create(incident).await.unwrap();

    let outcome = env
        .incident_service
        .escalate_auto(incident.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, EscalationOutcome::Advanced { level: 2, assignee: None });

    // The previous assignee is kept; no escalated notification was queued
    // since no user resolved.
    let refreshed = env.incident_repo.get(incident.id).await.unwrap().unwrap();
    assert_eq!(refreshed.assigned_to, Some(u1.id));
    let queued = env.queue.fetch_due(Utc::now() + Duration::seconds(1), 20).await.unwrap();
    assert!(queued.iter().all(|m| m.notification_type.as_str() != "escalated"));
}
