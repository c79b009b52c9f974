//! AWS CloudWatch (via SNS) payload normalizer.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::alert::{aws_severity, aws_status};
use crate::domain::models::ProcessedAlert;

/// SNS wraps the CloudWatch alarm JSON in a `Message` string; a bare alarm
/// object is accepted too.
pub fn normalize(payload: &Value) -> CoreResult<Vec<ProcessedAlert>> {
    let alarm_owned;
    let alarm: &Value = match payload.get("Message").and_then(Value::as_str) {
        Some(message) => {
            alarm_owned = serde_json::from_str::<Value>(message).map_err(|_| {
                CoreError::ValidationFailed("SNS Message is not valid JSON".to_string())
            })?;
            &alarm_owned
        }
        None => payload,
    };

    if !alarm.is_object() {
        return Err(CoreError::ValidationFailed(
            "cloudwatch payload must be a JSON object".to_string(),
        ));
    }

    let alarm_name = alarm
        .get("AlarmName")
        .and_then(Value::as_str)
        .unwrap_or("aws-alert");
    let state = alarm.get("NewStateValue").and_then(Value::as_str).unwrap_or("ALARM");

    let mut alert = ProcessedAlert::new(alarm_name);
    alert.severity = aws_severity(state);
    alert.status = aws_status(state);
    alert.summary = alarm
        .get("AlarmDescription")
        .and_then(Value::as_str)
        .unwrap_or(alarm_name)
        .to_string();
    alert.description = alarm
        .get("NewStateReason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    alert.starts_at = alarm
        .get("StateChangeTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    alert.labels.insert("alarm_name".to_string(), alarm_name.to_string());
    if let Some(region) = alarm.get("Region").and_then(Value::as_str) {
        alert.labels.insert("region".to_string(), region.to_string());
    }

    Ok(vec![alert])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::incident::Severity;
    use crate::domain::models::AlertStatus;
    use serde_json::json;

    #[test]
    fn test_sns_wrapped_alarm() {
        let inner = json!({
            "AlarmName": "HighErrorRate",
            "NewStateValue": "ALARM",
            "NewStateReason": "Threshold crossed",
            "Region": "us-east-1"
        });
        let payload = json!({"Type": "Notification", "Message": inner.to_string()});

        let alerts = normalize(&payload).unwrap();
        let alert = &alerts[0];
        assert_eq!(alert.alert_name, "HighErrorRate");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.description, "Threshold crossed");
        assert_eq!(alert.labels.get("region").map(String::as_str), Some("us-east-1"));
    }

    #[test]
    fn test_bare_alarm_object() {
        let payload = json!({"AlarmName": "HighErrorRate", "NewStateValue": "OK"});
        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Resolved);
        assert_eq!(alerts[0].severity, Severity::Info);
    }

    #[test]
    fn test_insufficient_data_fires_with_warning() {
        let payload = json!({"AlarmName": "X", "NewStateValue": "INSUFFICIENT_DATA"});
        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Firing);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn test_invalid_sns_message_rejected() {
        let payload = json!({"Message": "not-json"});
        assert!(normalize(&payload).is_err());
    }
}
