//! Generic webhook payload normalizer.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::incident::Severity;
use crate::domain::models::{AlertStatus, ProcessedAlert};

/// Accepts either a single alert object or `{"alerts": [...]}`.
pub fn normalize(payload: &Value) -> CoreResult<Vec<ProcessedAlert>> {
    if let Some(alerts) = payload.get("alerts").and_then(Value::as_array) {
        return alerts.iter().map(parse_alert).collect();
    }
    Ok(vec![parse_alert(payload)?])
}

fn parse_alert(value: &Value) -> CoreResult<ProcessedAlert> {
    if !value.is_object() {
        return Err(CoreError::ValidationFailed(
            "alert must be a JSON object".to_string(),
        ));
    }

    let alert_name = value
        .get("alert_name")
        .or_else(|| value.get("name"))
        .or_else(|| value.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("webhook-alert");

    let mut alert = ProcessedAlert::new(alert_name);
    alert.severity = value
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::from_str_or_default)
        .unwrap_or_default();
    alert.status = match value.get("status").and_then(Value::as_str) {
        None => AlertStatus::Firing,
        Some(s) => AlertStatus::from_str(s).unwrap_or(AlertStatus::Unknown),
    };
    alert.summary = value
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    alert.description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    alert.labels = string_map(value.get("labels"));
    alert.annotations = string_map(value.get("annotations"));
    alert.starts_at = value
        .get("starts_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    alert.fingerprint = value
        .get("fingerprint")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    Ok(alert)
}

fn string_map(value: Option<&Value>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(Value::Object(obj)) = value {
        for (key, val) in obj {
            if let Some(s) = val.as_str() {
                map.insert(key.clone(), s.to_string());
            }
        }
    }
    map
}
