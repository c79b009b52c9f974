//! Runtime configuration.
//!
//! Loaded by `infrastructure::config::ConfigLoader` from defaults, an
//! optional YAML file, the well-known raw environment keys, and the
//! `VIGIL_`-prefixed override namespace.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection string for the relational store. Required.
    pub database_url: String,

    /// Directory holding process-local state such as the identity key.
    pub data_dir: String,

    /// Base URL used when deriving integration webhook URLs.
    pub public_base_url: String,

    /// Identity provider endpoints/credentials for bearer-token checks.
    pub identity_provider_url: Option<String>,
    pub identity_provider_anon_key: Option<String>,
    pub identity_provider_jwt_secret: Option<String>,

    /// Whether the notification dispatcher worker runs in this process.
    pub notification_worker_enabled: bool,

    /// Escalation timer tick, in seconds.
    pub escalation_tick_interval: u64,

    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub ingest: IngestConfig,
    pub escalation: EscalationConfig,
    pub notifier: NotifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            data_dir: ".vigil".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            identity_provider_url: None,
            identity_provider_anon_key: None,
            identity_provider_jwt_secret: None,
            notification_worker_enabled: true,
            escalation_tick_interval: 15,
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            ingest: IngestConfig::default(),
            escalation: EscalationConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, enable_cors: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error.
    pub level: String,
    /// json or pretty.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "json".to_string() }
    }
}

/// Ingestion policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// When set, a firing payload whose fingerprint matches an open incident
    /// increments its alert count instead of opening a new incident.
    pub fingerprint_dedup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { fingerprint_dedup: false }
    }
}

/// Escalation timer policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// When set, the timer keeps advancing acknowledged incidents. By
    /// default acknowledgement halts timeout-based advancement.
    pub continue_after_ack: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self { continue_after_ack: false }
    }
}

/// Outbound delivery endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Push gateway endpoint; push delivery is skipped when unset.
    pub push_gateway_url: Option<String>,
    pub push_gateway_key: Option<String>,
    /// Chat webhook endpoint; chat delivery is skipped when unset.
    pub chat_webhook_url: Option<String>,
}
