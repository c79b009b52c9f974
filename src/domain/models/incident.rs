//! Incident model: the core event object, its lifecycle state machine, and
//! the append-only audit stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use std::collections::HashMap;

/// Lifecycle state. Transitions only move forward; a resolved incident is
/// never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Triggered,
    Acknowledged,
    Resolved,
}

impl Default for IncidentStatus {
    fn default() -> Self {
        Self::Triggered
    }
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "triggered" => Some(Self::Triggered),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Triggered | Self::Acknowledged)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [IncidentStatus] {
        match self {
            Self::Triggered => &[Self::Acknowledged, Self::Resolved],
            Self::Acknowledged => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Alert/incident severity, normalized across vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Warning,
    Info,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Warning
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    /// Lenient parse used on vendor input: unknown strings fall back to the
    /// default severity rather than failing the alert.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }

    /// Informational severities page with low urgency.
    pub fn urgency(&self) -> Urgency {
        match self {
            Self::Info | Self::Warning => Urgency::Low,
            Self::Critical | Self::High => Urgency::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Low,
}

impl Default for Urgency {
    fn default() -> Self {
        Self::High
    }
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Where the incident sits in its escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    /// Escalation has not started (or no policy applies).
    None,
    /// Mid-policy: further levels remain.
    Pending,
    /// The final level has been reached.
    Completed,
}

impl Default for EscalationStatus {
    fn default() -> Self {
        Self::None
    }
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// The label key under which alert fingerprints are persisted.
pub const FINGERPRINT_LABEL: &str = "fingerprint";

/// The core event object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub urgency: Urgency,
    pub source: String,
    pub service_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub escalation_policy_id: Option<Uuid>,
    /// 1-indexed.
    pub current_escalation_level: u32,
    pub escalation_status: EscalationStatus,
    pub last_escalated_at: Option<DateTime<Utc>>,
    /// External dedup key (events-API style senders).
    pub incident_key: Option<String>,
    pub labels: HashMap<String, String>,
    pub custom_fields: HashMap<String, Value>,
    pub alert_count: u32,
    pub assigned_to: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(organization_id: Uuid, title: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            title: title.into(),
            description: String::new(),
            status: IncidentStatus::Triggered,
            severity: Severity::default(),
            urgency: Urgency::default(),
            source: source.into(),
            service_id: None,
            group_id: None,
            escalation_policy_id: None,
            current_escalation_level: 1,
            escalation_status: EscalationStatus::None,
            last_escalated_at: None,
            incident_key: None,
            labels: HashMap::new(),
            custom_fields: HashMap::new(),
            alert_count: 1,
            assigned_to: None,
            assigned_at: None,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.labels.get(FINGERPRINT_LABEL).map(String::as_str)
    }

    /// Acknowledge the incident. Returns `Ok(false)` (a no-op) when it is
    /// already acknowledged; acknowledging a resolved incident is a conflict.
    pub fn acknowledge(&mut self, by: Uuid, at: DateTime<Utc>) -> Result<bool, String> {
        match self.status {
            IncidentStatus::Acknowledged => Ok(false),
            IncidentStatus::Resolved => {
                Err("cannot acknowledge a resolved incident".to_string())
            }
            IncidentStatus::Triggered => {
                self.status = IncidentStatus::Acknowledged;
                self.acknowledged_by = Some(by);
                self.acknowledged_at = Some(at);
                self.updated_at = at;
                Ok(true)
            }
        }
    }

    /// Resolve from any open state.
    pub fn resolve(&mut self, by: Uuid, at: DateTime<Utc>) -> Result<(), String> {
        if self.status == IncidentStatus::Resolved {
            return Err("incident is already resolved".to_string());
        }
        self.status = IncidentStatus::Resolved;
        self.resolved_by = Some(by);
        self.resolved_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Reassign without touching the lifecycle status.
    pub fn assign(&mut self, to: Uuid, at: DateTime<Utc>) {
        self.assigned_to = Some(to);
        self.assigned_at = Some(at);
        self.updated_at = at;
    }

    /// Record another correlated firing of the same condition.
    pub fn record_refire(&mut self, at: DateTime<Utc>) {
        self.alert_count += 1;
        self.updated_at = at;
    }

    /// The reference instant for escalation timeout math.
    pub fn escalation_anchor(&self) -> DateTime<Utc> {
        self.last_escalated_at.unwrap_or(self.created_at)
    }

    /// Cross-field timestamp invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("incident title cannot be empty".to_string());
        }
        if let Some(acked) = self.acknowledged_at {
            if acked < self.created_at {
                return Err("acknowledged_at precedes created_at".to_string());
            }
        }
        if let Some(resolved) = self.resolved_at {
            let floor = self.acknowledged_at.unwrap_or(self.created_at);
            if resolved < floor {
                return Err("resolved_at precedes acknowledgement/creation".to_string());
            }
        }
        if self.alert_count == 0 {
            return Err("alert_count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Audit event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentEventType {
    Triggered,
    Acknowledged,
    Resolved,
    Assigned,
    Escalated,
    EscalationCompleted,
    Note,
}

impl IncidentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Triggered => "triggered",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Assigned => "assigned",
            Self::Escalated => "escalated",
            Self::EscalationCompleted => "escalation_completed",
            Self::Note => "note",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "triggered" => Some(Self::Triggered),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            "assigned" => Some(Self::Assigned),
            "escalated" => Some(Self::Escalated),
            "escalation_completed" => Some(Self::EscalationCompleted),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

/// One append-only audit record. Events are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub event_type: IncidentEventType,
    pub event_data: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl IncidentEvent {
    pub fn new(incident_id: Uuid, event_type: IncidentEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            incident_id,
            event_type,
            event_data: Value::Object(serde_json::Map::new()),
            created_at: Utc::now(),
            created_by: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.event_data = data;
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }
}
