//! SQLite implementation of the UserRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{DeviceToken, User};
use crate::domain::ports::UserRepository;

use super::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    provider_id: String,
    email: String,
    name: String,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid(&row.id, "id")?,
            provider_id: row.provider_id,
            email: row.email,
            name: row.name,
            is_active: row.is_active != 0,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeviceTokenRow {
    id: String,
    user_id: String,
    token: String,
    platform: String,
    created_at: String,
}

impl TryFrom<DeviceTokenRow> for DeviceToken {
    type Error = CoreError;

    fn try_from(row: DeviceTokenRow) -> Result<Self, Self::Error> {
        Ok(DeviceToken {
            id: parse_uuid(&row.id, "id")?,
            user_id: parse_uuid(&row.user_id, "user_id")?,
            token: row.token,
            platform: row.platform,
            created_at: parse_ts(&row.created_at, "created_at")?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO users (id, provider_id, email, name, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.provider_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(i64::from(user.is_active))
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_provider_id(&self, provider_id: &str) -> CoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, user: &User) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE users SET provider_id = ?, email = ?, name = ?, is_active = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&user.provider_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(i64::from(user.is_active))
        .bind(user.updated_at.to_rfc3339())
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn ensure_system_user(&self, source: &str) -> CoreResult<User> {
        let provider_id = format!("system:{source}");
        if let Some(existing) = self.get_by_provider_id(&provider_id).await? {
            return Ok(existing);
        }

        let user = User::system(source);
        // A concurrent ensure may have won the race; re-read on conflict.
        match self.create(&user).await {
            Ok(()) => Ok(user),
            Err(CoreError::Database(_)) => self
                .get_by_provider_id(&provider_id)
                .await?
                .ok_or_else(|| CoreError::not_found("user", &provider_id)),
            Err(e) => Err(e),
        }
    }

    async fn add_device_token(&self, token: &DeviceToken) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO user_device_tokens (id, user_id, token, platform, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(token.id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.token)
        .bind(&token.platform)
        .bind(token.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_device_tokens(&self, user_id: Uuid) -> CoreResult<Vec<DeviceToken>> {
        let rows: Vec<DeviceTokenRow> =
            sqlx::query_as("SELECT * FROM user_device_tokens WHERE user_id = ? ORDER BY created_at")
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
