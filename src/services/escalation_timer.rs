//! Escalation timer loop.
//!
//! Periodically advances open incidents whose current level has timed out,
//! reusing the same state machine as manual escalation. The loop never
//! surfaces errors; it logs, records audit events through the incident
//! service, and keeps iterating.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Incident, IncidentStatus};
use crate::domain::ports::{EscalationRepository, IncidentRepository};

use super::incident_service::{EscalationOutcome, IncidentService};

const SCAN_LIMIT: u32 = 200;

pub struct EscalationTimer {
    incidents: Arc<dyn IncidentRepository>,
    policies: Arc<dyn EscalationRepository>,
    incident_service: Arc<IncidentService>,
    /// Whether acknowledged incidents keep escalating. Off by default:
    /// acknowledgement halts timeout-based advancement.
    continue_after_ack: bool,
}

impl EscalationTimer {
    pub fn new(
        incidents: Arc<dyn IncidentRepository>,
        policies: Arc<dyn EscalationRepository>,
        incident_service: Arc<IncidentService>,
        continue_after_ack: bool,
    ) -> Self {
        Self { incidents, policies, incident_service, continue_after_ack }
    }

    /// Timer loop. In-flight advances complete their transaction before the
    /// loop exits on shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        tracing::info!(tick_secs = tick.as_secs(), "escalation timer started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!(error = %e, "escalation scan failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("escalation timer stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One scan round. Returns how many incidents were advanced.
    pub async fn tick(&self) -> CoreResult<usize> {
        let candidates = self.incidents.list_escalation_candidates(SCAN_LIMIT).await?;
        let now = Utc::now();
        let mut advanced = 0;

        for incident in candidates {
            if incident.status == IncidentStatus::Acknowledged && !self.continue_after_ack {
                continue;
            }

            match self.is_due(&incident).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        incident_id = %incident.id,
                        error = %e,
                        "could not evaluate escalation deadline"
                    );
                    continue;
                }
            }

            match self.incident_service.escalate_auto(incident.id, now).await {
                Ok(EscalationOutcome::Advanced { level, assignee }) => {
                    advanced += 1;
                    tracing::info!(
                        incident_id = %incident.id,
                        level,
                        assignee = ?assignee,
                        "escalated incident on timeout"
                    );
                }
                Ok(EscalationOutcome::Exhausted) => {
                    tracing::info!(
                        incident_id = %incident.id,
                        "escalation policy exhausted"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        incident_id = %incident.id,
                        error = %e,
                        "timer escalation failed"
                    );
                }
            }
        }

        Ok(advanced)
    }

    /// Whether the incident's current level has timed out.
    async fn is_due(&self, incident: &Incident) -> CoreResult<bool> {
        let Some(policy_id) = incident.escalation_policy_id else {
            return Ok(false);
        };
        let Some(level) = self
            .policies
            .get_level(policy_id, incident.current_escalation_level)
            .await?
        else {
            // Policy was edited under the incident; nothing to time against.
            return Ok(false);
        };

        let deadline = incident.escalation_anchor()
            + ChronoDuration::minutes(i64::from(level.timeout_minutes));
        Ok(Utc::now() >= deadline)
    }
}
