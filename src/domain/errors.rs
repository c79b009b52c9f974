//! Domain errors for the incident management core.

use thiserror::Error;

/// Core errors surfaced by the services and repositories.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Missing organization context")]
    MissingOrgContext,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Override window equals the shift window; declare a full override instead")]
    UsePartialOverrideForFullTimes,

    #[error("Conflicting state: {0}")]
    ConflictState(String),

    #[error("No on-call found for {scope} at {at}")]
    NoOnCallFound { scope: String, at: String },

    #[error("Dependency failed: {0}")]
    DependencyFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for a typed not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Returns true if a retry could plausibly succeed.
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::DependencyFailed(_) | Self::Database(_))
    }

    /// Returns true if the caller, not the system, is at fault.
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden(_)
                | Self::MissingOrgContext
                | Self::ValidationFailed(_)
                | Self::UsePartialOverrideForFullTimes
                | Self::ConflictState(_)
        )
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
