//! Vigil - On-Call Incident Management Backend
//!
//! The control plane for alert-driven incident response:
//! - Webhook ingestion with per-vendor normalization and fingerprint dedup
//! - Relationship-based access control over a single membership table
//! - Rotation scheduling with overrides and effective on-call resolution
//! - Time-bound escalation policies with mixed target types
//! - Durable notification queue with a fan-out worker
//! - SQLite persistence with WAL mode

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{CoreError, CoreResult};
pub use domain::models::Config;
