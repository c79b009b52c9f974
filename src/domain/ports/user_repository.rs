//! User repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{DeviceToken, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>>;

    async fn get_by_provider_id(&self, provider_id: &str) -> CoreResult<Option<User>>;

    async fn update(&self, user: &User) -> CoreResult<()>;

    /// The synthetic principal for an automation source, created on first
    /// use.
    async fn ensure_system_user(&self, source: &str) -> CoreResult<User>;

    async fn add_device_token(&self, token: &DeviceToken) -> CoreResult<()>;

    async fn list_device_tokens(&self, user_id: Uuid) -> CoreResult<Vec<DeviceToken>>;
}
