//! Grafana alert webhook normalizer.

use chrono::Utc;
use serde_json::Value;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::alert::{grafana_severity, grafana_status};
use crate::domain::models::ProcessedAlert;

pub fn normalize(payload: &Value) -> CoreResult<Vec<ProcessedAlert>> {
    if !payload.is_object() {
        return Err(CoreError::ValidationFailed(
            "grafana payload must be a JSON object".to_string(),
        ));
    }

    let rule_name = payload
        .get("ruleName")
        .and_then(Value::as_str)
        .unwrap_or("grafana-alert");
    let state = payload.get("state").and_then(Value::as_str).unwrap_or("");

    let mut alert = ProcessedAlert::new(rule_name);
    alert.severity = grafana_severity(state);
    alert.status = grafana_status(state);
    alert.summary = payload
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or(rule_name)
        .to_string();
    alert.description = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    alert.starts_at = Utc::now();

    if let Some(Value::Object(tags)) = payload.get("tags") {
        for (key, value) in tags {
            if let Some(s) = value.as_str() {
                alert.labels.insert(key.clone(), s.to_string());
            }
        }
    }

    Ok(vec![alert])
}
