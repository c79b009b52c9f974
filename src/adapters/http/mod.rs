//! HTTP adapters: router, extractors, handlers, and error mapping.

pub mod auth;
pub mod error;
pub mod groups;
pub mod incidents;
pub mod integrations;
pub mod policies;
pub mod schedules;
pub mod server;
pub mod services;
pub mod webhooks;

pub use auth::{AuthContext, OrgContext};
pub use error::ApiError;
pub use server::{AppState, HttpServer, HttpServerConfig};
