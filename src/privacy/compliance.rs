use crate::config::toml_config::PrivacyConfig;
use crate::privacy::redactor::{PiiRedactor, PiiReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub issues: Vec<String>,
    pub pii_report: PiiReport,
}

/// GDPR/CCPA gate applied before anything is written to the data lake.
pub struct ComplianceValidator {
    redactor: Arc<PiiRedactor>,
    max_payload_bytes: usize,
    required_fields: Vec<String>,
}

impl ComplianceValidator {
    pub fn new(redactor: Arc<PiiRedactor>) -> Self {
        Self {
            redactor,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            required_fields: Vec::new(),
        }
    }

    pub fn from_config(redactor: Arc<PiiRedactor>, config: &PrivacyConfig) -> Self {
        Self {
            redactor,
            max_payload_bytes: config.max_payload_bytes,
            required_fields: config.required_fields.clone(),
        }
    }

    pub fn with_required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    pub fn validate_data_for_storage(&self, data: &Value) -> ComplianceReport {
        let mut issues = Vec::new();

        let pii_report = self.redactor.pii_report(data);
        if pii_report.pii_detected {
            let types: Vec<&str> = pii_report.pii_types.iter().map(|t| t.as_str()).collect();
            issues.push(format!("PII detected: {}", types.join(", ")));
        }

        // Value 的 Display 即為緊湊 JSON
        let size = data.to_string().len();
        if size > self.max_payload_bytes {
            issues.push(format!(
                "Payload size {} bytes exceeds limit {} bytes",
                size, self.max_payload_bytes
            ));
        }

        for field in &self.required_fields {
            let present = data
                .as_object()
                .map(|obj| obj.get(field).is_some_and(|v| !v.is_null()))
                .unwrap_or(false);
            if !present {
                issues.push(format!("Missing required field: {}", field));
            }
        }

        ComplianceReport {
            compliant: issues.is_empty(),
            issues,
            pii_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oversized_payload_is_rejected() {
        let validator =
            ComplianceValidator::new(Arc::new(PiiRedactor::new())).with_max_payload_bytes(16);
        let report = validator.validate_data_for_storage(&json!({"notes": "a fairly long note"}));

        assert!(!report.compliant);
        assert!(report.issues[0].starts_with("Payload size"));
        assert!(!report.pii_report.pii_detected);
    }

    #[test]
    fn test_required_fields() {
        let validator = ComplianceValidator::new(Arc::new(PiiRedactor::new()))
            .with_required_fields(vec!["timestamp".to_string(), "workflow_id".to_string()]);

        let report = validator.validate_data_for_storage(&json!({
            "timestamp": "2024-10-22T10:00:00Z",
            "workflow_id": null,
        }));

        assert_eq!(report.issues, vec!["Missing required field: workflow_id"]);
    }

    #[test]
    fn test_issue_lists_every_pii_type() {
        let validator = ComplianceValidator::new(Arc::new(PiiRedactor::new()));
        let report = validator.validate_data_for_storage(&json!({
            "ssn": "123-45-6789",
            "email": "john@example.com",
        }));

        assert_eq!(report.issues, vec!["PII detected: ssn, email"]);
    }
}
