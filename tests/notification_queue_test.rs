//! Durable notification queue and dispatcher tests.

mod helpers;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use helpers::TestEnv;
use vigil::domain::errors::{CoreError, CoreResult};
use vigil::domain::models::{
    Incident, NotificationChannel, NotificationMessage, NotificationStatus, NotificationType,
    User,
};
use vigil::domain::ports::{NotificationQueue, Notifier};
use vigil::services::NotificationDispatcher;

/// In-memory notifier that records deliveries and can be made to fail.
struct RecordingNotifier {
    channel: NotificationChannel,
    delivered: Mutex<Vec<Uuid>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    fn new(channel: NotificationChannel) -> Arc<Self> {
        Arc::new(Self { channel, delivered: Mutex::new(Vec::new()), failing: AtomicBool::new(false) })
    }

    fn delivered_ids(&self) -> Vec<Uuid> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn deliver(
        &self,
        message: &NotificationMessage,
        _incident: &Incident,
        _recipient: &User,
    ) -> CoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::DependencyFailed("simulated outage".to_string()));
        }
        self.delivered.lock().unwrap().push(message.id);
        Ok(())
    }
}

async fn seed_envelope(env: &TestEnv) -> (NotificationMessage, Uuid) {
    let org = env.seed_org().await;
    let user = env.seed_user("alice").await;
    let incident =
        env.incident_service.create(Incident::new(org, "db down", "manual")).await.unwrap();

    let message =
        NotificationMessage::for_event(NotificationType::Acknowledged, user.id, incident.id);
    env.queue.enqueue(&message).await.unwrap();
    (message, user.id)
}

#[tokio::test]
async fn test_fetch_due_claims_envelopes() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    let due = env.queue.fetch_due(Utc::now() + Duration::seconds(1), 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, message.id);
    assert_eq!(due[0].status, NotificationStatus::Delivering);

    // Claimed envelopes are not handed out twice.
    let again = env.queue.fetch_due(Utc::now() + Duration::seconds(1), 10).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_future_visibility_hides_envelope() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    env.queue
        .reschedule(message.id, 1, Utc::now() + Duration::minutes(5))
        .await
        .unwrap();

    let due = env.queue.fetch_due(Utc::now(), 10).await.unwrap();
    assert!(due.is_empty());

    let later = env
        .queue
        .fetch_due(Utc::now() + Duration::minutes(6), 10)
        .await
        .unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later[0].retry_count, 1);
}

#[tokio::test]
async fn test_high_priority_drains_first() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let user = env.seed_user("alice").await;
    let incident =
        env.incident_service.create(Incident::new(org, "db down", "manual")).await.unwrap();

    let medium =
        NotificationMessage::for_event(NotificationType::Resolved, user.id, incident.id);
    env.queue.enqueue(&medium).await.unwrap();
    let high =
        NotificationMessage::for_event(NotificationType::Escalated, user.id, incident.id);
    env.queue.enqueue(&high).await.unwrap();

    let due = env.queue.fetch_due(Utc::now() + Duration::seconds(1), 1).await.unwrap();
    assert_eq!(due[0].id, high.id);
}

#[tokio::test]
async fn test_release_stuck_returns_claims_to_pending() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    env.queue.fetch_due(Utc::now() + Duration::seconds(1), 10).await.unwrap();
    // Nothing is stuck yet.
    assert_eq!(env.queue.release_stuck(Utc::now() - Duration::minutes(10)).await.unwrap(), 0);
    // With a future cutoff every delivering claim counts as stuck.
    assert_eq!(env.queue.release_stuck(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);

    let due = env.queue.fetch_due(Utc::now() + Duration::seconds(2), 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, message.id);
}

#[tokio::test]
async fn test_dispatcher_delivers_and_marks_done() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    let chat = RecordingNotifier::new(NotificationChannel::Chat);
    let dispatcher = NotificationDispatcher::new(
        env.queue.clone(),
        env.incident_repo.clone(),
        env.users.clone(),
        vec![chat.clone() as Arc<dyn Notifier>],
    );

    let delivered = dispatcher.process_batch().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(chat.delivered_ids(), vec![message.id]);

    assert_eq!(env.queue.pending_count().await.unwrap(), 0);
    let (status,): (String,) =
        sqlx::query_as("SELECT status FROM incident_notifications WHERE id = ?")
            .bind(message.id.to_string())
            .fetch_one(&env.pool)
            .await
            .unwrap();
    assert_eq!(status, "delivered");
}

#[tokio::test]
async fn test_dispatcher_reenqueues_failures_with_backoff() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    let chat = RecordingNotifier::new(NotificationChannel::Chat);
    chat.failing.store(true, Ordering::SeqCst);
    let dispatcher = NotificationDispatcher::new(
        env.queue.clone(),
        env.incident_repo.clone(),
        env.users.clone(),
        vec![chat.clone() as Arc<dyn Notifier>],
    );

    let delivered = dispatcher.process_batch().await.unwrap();
    assert_eq!(delivered, 0);

    let (status, retry_count, visible_at): (String, i64, String) = sqlx::query_as(
        "SELECT status, retry_count, visible_at FROM incident_notifications WHERE id = ?",
    )
    .bind(message.id.to_string())
    .fetch_one(&env.pool)
    .await
    .unwrap();
    assert_eq!(status, "pending");
    assert_eq!(retry_count, 1);
    // Hidden until the backoff elapses.
    assert!(visible_at > Utc::now().to_rfc3339());

    // Once the outage ends, a later batch delivers it.
    chat.failing.store(false, Ordering::SeqCst);
    env.queue.reschedule(message.id, 1, Utc::now()).await.unwrap();
    let delivered = dispatcher.process_batch().await.unwrap();
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn test_dispatcher_parks_exhausted_envelopes() {
    let env = TestEnv::new().await;
    let (message, _) = seed_envelope(&env).await;

    // Burn through the retry budget.
    env.queue
        .reschedule(message.id, NotificationMessage::MAX_RETRIES, Utc::now())
        .await
        .unwrap();

    let chat = RecordingNotifier::new(NotificationChannel::Chat);
    chat.failing.store(true, Ordering::SeqCst);
    let dispatcher = NotificationDispatcher::new(
        env.queue.clone(),
        env.incident_repo.clone(),
        env.users.clone(),
        vec![chat as Arc<dyn Notifier>],
    );
    dispatcher.process_batch().await.unwrap();

    let (status,): (String,) =
        sqlx::query_as("SELECT status FROM incident_notifications WHERE id = ?")
            .bind(message.id.to_string())
            .fetch_one(&env.pool)
            .await
            .unwrap();
    assert_eq!(status, "dead");
}

#[tokio::test]
async fn test_dispatcher_skips_channels_without_notifier() {
    let env = TestEnv::new().await;
    let org = env.seed_org().await;
    let user = env.seed_user("alice").await;
    let incident =
        env.incident_service.create(Incident::new(org, "db down", "manual")).await.unwrap();

    // Assigned fans out to push + chat, but only chat is configured.
    let message =
        NotificationMessage::for_event(NotificationType::Assigned, user.id, incident.id);
    env.queue.enqueue(&message).await.unwrap();

    let chat = RecordingNotifier::new(NotificationChannel::Chat);
    let dispatcher = NotificationDispatcher::new(
        env.queue.clone(),
        env.incident_repo.clone(),
        env.users.clone(),
        vec![chat.clone() as Arc<dyn Notifier>],
    );

    let delivered = dispatcher.process_batch().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(chat.delivered_ids(), vec![message.id]);
}
