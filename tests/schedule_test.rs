//! Scheduling tests: scheduler lifecycle, overrides, and effective on-call
//! resolution.

mod helpers;

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use helpers::TestEnv;
use vigil::domain::errors::CoreError;
use vigil::domain::models::{OverrideType, Scheduler, Shift};
use vigil::domain::ports::{OnCallScope, ScheduleRepository};

fn t(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap().and_utc()
}

#[tokio::test]
async fn test_scheduler_name_allocation_suffixes_on_collision() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let user = env.seed_user("alice").await;

    for expected in ["primary", "primary-1", "primary-2"] {
        let scheduler = Scheduler::new(org, group.id, "primary", "Primary");
        let shift = Shift::new(scheduler.id, user.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"));
        let created = env
            .schedule_service
            .create_scheduler(scheduler, vec![shift])
            .await
            .unwrap();
        assert_eq!(created.name, expected);
    }
}

#[tokio::test]
async fn test_scheduler_and_shifts_commit_together() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let user = env.seed_user("alice").await;

    let scheduler = Scheduler::new(org, group.id, "weekly", "Weekly");
    let bad_shift = Shift::new(scheduler.id, user.id, t("2025-01-13 00:00"), t("2025-01-06 00:00"));
    let err = env
        .schedule_service
        .create_scheduler(scheduler, vec![bad_shift])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed(_)));

    // Nothing was persisted.
    assert!(env
        .schedules
        .find_scheduler_by_name(group.id, "weekly")
        .await
        .unwrap()
        .is_none());

    // A mid-batch database failure rolls the whole tuple back.
    let scheduler = Scheduler::new(org, group.id, "weekly", "Weekly");
    let good = Shift::new(scheduler.id, user.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"));
    let mut bad = Shift::new(scheduler.id, user.id, t("2025-01-13 00:00"), t("2025-01-20 00:00"));
    bad.end_time = bad.start_time; // violates the table CHECK
    assert!(env
        .schedules
        .create_scheduler_with_shifts(&scheduler, &[good, bad])
        .await
        .is_err());
    assert!(env
        .schedules
        .find_scheduler_by_name(group.id, "weekly")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_replace_shifts_is_wholesale() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (scheduler, _) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let replacement = vec![
        Shift::new(scheduler.id, u2.id, t("2025-01-06 00:00"), t("2025-01-09 00:00")),
        Shift::new(scheduler.id, u1.id, t("2025-01-09 00:00"), t("2025-01-13 00:00")),
    ];
    env.schedule_service.replace_shifts(scheduler.id, replacement).await.unwrap();

    let shifts = env.schedule_service.list_shifts(scheduler.id).await.unwrap();
    assert_eq!(shifts.len(), 2);
    assert_eq!(shifts[0].user_id, u2.id);
    assert_eq!(shifts[1].user_id, u1.id);
}

#[tokio::test]
async fn test_replace_with_same_set_is_semantically_stable() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let user = env.seed_user("alice").await;

    let (scheduler, shift) = env
        .seed_schedule(org, group.id, user.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let same = vec![Shift::new(scheduler.id, user.id, shift.start_time, shift.end_time)];
    env.schedule_service.replace_shifts(scheduler.id, same).await.unwrap();

    let shifts = env.schedule_service.list_shifts(scheduler.id).await.unwrap();
    assert_eq!(shifts.len(), 1);
    // IDs may change; windows and users do not.
    assert_eq!(shifts[0].user_id, user.id);
    assert_eq!(shifts[0].start_time, shift.start_time);
    assert_eq!(shifts[0].end_time, shift.end_time);
}

#[tokio::test]
async fn test_partial_override_changes_only_its_window() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (scheduler, shift) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    env.schedule_service
        .create_override(
            shift.id,
            u2.id,
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
            OverrideType::Temporary,
            "covering for vacation".to_string(),
            false,
        )
        .await
        .unwrap();

    let scope = OnCallScope::Scheduler(scheduler.id);
    let before = env.schedules.effective_at(scope, t("2025-01-07 12:00")).await.unwrap().unwrap();
    let during = env.schedules.effective_at(scope, t("2025-01-08 12:00")).await.unwrap().unwrap();
    let after = env.schedules.effective_at(scope, t("2025-01-10 00:00")).await.unwrap().unwrap();

    assert_eq!(before.effective_user_id, u1.id);
    assert_eq!(during.effective_user_id, u2.id);
    assert_eq!(during.original_user_id, u1.id);
    assert!(during.override_id.is_some());
    assert_eq!(after.effective_user_id, u1.id);

    // Group scope resolves the same way.
    let by_group = env
        .schedules
        .effective_at(OnCallScope::Group(group.id), t("2025-01-08 12:00"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_group.effective_user_id, u2.id);
}

#[tokio::test]
async fn test_full_window_override_requires_declaration() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (_, shift) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let err = env
        .schedule_service
        .create_override(
            shift.id,
            u2.id,
            shift.start_time,
            shift.end_time,
            OverrideType::Temporary,
            String::new(),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UsePartialOverrideForFullTimes));

    // Declared full, the same window is accepted.
    env.schedule_service
        .create_override(
            shift.id,
            u2.id,
            shift.start_time,
            shift.end_time,
            OverrideType::Temporary,
            String::new(),
            true,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_override_outside_shift_window_rejected() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (_, shift) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let err = env
        .schedule_service
        .create_override(
            shift.id,
            u2.id,
            t("2025-01-05 00:00"),
            t("2025-01-08 00:00"),
            OverrideType::Temporary,
            String::new(),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed(_)));
}

#[tokio::test]
async fn test_override_removal_restores_original_assignment() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (scheduler, shift) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let ov = env
        .schedule_service
        .create_override(
            shift.id,
            u2.id,
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
            OverrideType::Emergency,
            String::new(),
            false,
        )
        .await
        .unwrap();

    let scope = OnCallScope::Scheduler(scheduler.id);
    let during = env.schedules.effective_at(scope, t("2025-01-08 12:00")).await.unwrap().unwrap();
    assert_eq!(during.effective_user_id, u2.id);

    env.schedule_service.remove_override(ov.id).await.unwrap();

    // The whole window belongs to the original user again.
    for instant in ["2025-01-07 12:00", "2025-01-08 12:00", "2025-01-10 00:00"] {
        let row = env.schedules.effective_at(scope, t(instant)).await.unwrap().unwrap();
        assert_eq!(row.effective_user_id, u1.id);
        assert!(row.override_id.is_none());
    }
}

#[tokio::test]
async fn test_point_query_returns_exactly_one_row() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let u1 = env.seed_user("alice").await;
    let u2 = env.seed_user("bob").await;

    let (scheduler, shift) = env
        .seed_schedule(org, group.id, u1.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;
    env.schedule_service
        .create_override(
            shift.id,
            u2.id,
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
            OverrideType::Temporary,
            String::new(),
            false,
        )
        .await
        .unwrap();

    // Boundary instants land in exactly one sub-interval; the override
    // window wins its own boundaries.
    let at_override_start = env
        .schedules
        .effective_at(OnCallScope::Scheduler(scheduler.id), t("2025-01-08 09:00"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at_override_start.effective_user_id, u2.id);

    let at_override_end = env
        .schedules
        .effective_at(OnCallScope::Scheduler(scheduler.id), t("2025-01-09 17:00"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at_override_end.effective_user_id, u1.id);
}

#[tokio::test]
async fn test_no_on_call_found() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let group = env.seed_group(org).await;
    let user = env.seed_user("alice").await;

    let (scheduler, _) = env
        .seed_schedule(org, group.id, user.id, t("2025-01-06 00:00"), t("2025-01-13 00:00"))
        .await;

    let outside = t("2025-02-01 00:00");
    assert!(env
        .schedules
        .effective_at(OnCallScope::Scheduler(scheduler.id), outside)
        .await
        .unwrap()
        .is_none());

    let err = env
        .schedule_service
        .require_on_call(OnCallScope::Scheduler(scheduler.id), outside)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoOnCallFound { .. }));

    assert!(env
        .schedules
        .effective_at(OnCallScope::Group(Uuid::new_v4()), outside)
        .await
        .unwrap()
        .is_none());
}
