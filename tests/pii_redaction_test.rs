use serde_json::json;
use std::sync::Arc;
use zevbit_flywheel::{ComplianceValidator, PiiRedactor, PiiType};

#[test]
fn test_email_redaction() {
    let redactor = PiiRedactor::new();
    let clean = redactor.redact(&json!({"customer_email": "john@example.com"}));

    assert_eq!(clean["customer_email"], "[REDACTED_EMAIL]");
    assert!(redactor.validate_no_pii(&clean));
}

#[test]
fn test_phone_redaction_formats() {
    let redactor = PiiRedactor::new();
    for phone in ["(555) 123-4567", "555-123-4567", "555.123.4567", "5551234567"] {
        let clean = redactor.redact(&json!({ "phone": phone }));
        assert_eq!(clean["phone"], "[REDACTED_PHONE]", "phone format {}", phone);
    }
}

#[test]
fn test_ssn_redaction() {
    let redactor = PiiRedactor::new();
    let clean = redactor.redact(&json!({"ssn": "123-45-6789"}));

    assert_eq!(clean["ssn"], "[REDACTED_SSN]");
    assert!(redactor.validate_no_pii(&clean));
}

#[test]
fn test_credit_card_redaction() {
    let redactor = PiiRedactor::new();
    for card in ["1234-5678-9012-3456", "1234 5678 9012 3456", "1234567890123456"] {
        let clean = redactor.redact(&json!({ "card": card }));
        assert_eq!(clean["card"], "[REDACTED_CC]", "card format {}", card);
    }
}

#[test]
fn test_adjacent_matches_are_fully_redacted() {
    let redactor = PiiRedactor::new();
    // 電話號碼被替換後 SSN 才出現字界
    let clean = redactor.redact(&json!({"notes": "ref 123-45-6789555-123-4567"}));

    assert_eq!(clean["notes"], "ref [REDACTED_SSN][REDACTED_PHONE]");
    assert!(redactor.validate_no_pii(&clean));
}

#[test]
fn test_nested_structure_redaction() {
    let redactor = PiiRedactor::new();
    let data = json!({
        "customer": {
            "name": "John Smith",
            "contact": {
                "email": "john@example.com",
                "phone": "(555) 123-4567"
            },
            "projects": [
                {"id": 1, "contact_email": "project1@example.com"},
                {"id": 2, "contact_email": "project2@example.com"}
            ]
        },
        "cost": 8500
    });

    let clean = redactor.redact(&data);

    assert_eq!(clean["customer"]["contact"]["email"], "[REDACTED_EMAIL]");
    assert_eq!(clean["customer"]["contact"]["phone"], "[REDACTED_PHONE]");
    assert_eq!(clean["customer"]["projects"][1]["contact_email"], "[REDACTED_EMAIL]");

    // 非個資欄位保持不變
    assert_eq!(clean["cost"], 8500);
    assert_eq!(clean["customer"]["projects"][0]["id"], 1);
    assert_eq!(clean["customer"]["projects"].as_array().unwrap().len(), 2);
    assert!(redactor.validate_no_pii(&clean));
}

#[test]
fn test_pii_detection() {
    let redactor = PiiRedactor::new();
    let data = json!({
        "email": "test@example.com",
        "phone": "(555) 123-4567",
        "cost": 5000
    });

    let detected = redactor.detect_pii(&data);

    assert!(detected.contains(&PiiType::Email));
    assert!(detected.contains(&PiiType::Phone));
    assert_eq!(detected.len(), 2);
}

/// Every known PII sample must be detected (zero false negatives).
#[test]
fn test_false_negatives() {
    let redactor = PiiRedactor::new();
    let cases = [
        (PiiType::Email, "user@domain.com"),
        (PiiType::Email, "first.last@company.co.uk"),
        (PiiType::Phone, "(555) 123-4567"),
        (PiiType::Phone, "555-123-4567"),
        (PiiType::Ssn, "123-45-6789"),
        (PiiType::CreditCard, "1234-5678-9012-3456"),
        (PiiType::CreditCard, "1234567890123456"),
    ];

    let false_negatives: Vec<_> = cases
        .iter()
        .filter(|(pii_type, value)| !redactor.detect_pii_str(value).contains(pii_type))
        .collect();

    assert!(
        false_negatives.is_empty(),
        "False negatives detected: {:?}",
        false_negatives
    );
}

#[test]
fn test_anonymization_deterministic() {
    let redactor = PiiRedactor::new();
    let first = redactor.anonymize("John Smith", "customer");
    let second = PiiRedactor::new().anonymize("John Smith", "customer");

    assert_eq!(first, second);
    assert_eq!(first.len(), "customer_".len() + 6);
}

#[test]
fn test_anonymization_different_categories() {
    let redactor = PiiRedactor::new();
    let customer_id = redactor.anonymize("John Smith", "customer");
    let contractor_id = redactor.anonymize("John Smith", "contractor");

    assert_ne!(customer_id, contractor_id);
    assert!(customer_id.starts_with("customer_"));
    assert!(contractor_id.starts_with("contractor_"));
}

#[test]
fn test_compliance_validation() {
    let redactor = Arc::new(PiiRedactor::new());
    let validator = ComplianceValidator::new(redactor.clone());

    let data_with_pii = json!({"email": "john@example.com"});
    let result = validator.validate_data_for_storage(&data_with_pii);

    assert!(!result.compliant);
    assert!(!result.issues.is_empty());
    assert!(result.pii_report.pii_detected);

    let clean = redactor.redact(&data_with_pii);
    let result = validator.validate_data_for_storage(&clean);

    assert!(result.compliant);
    assert!(result.issues.is_empty());
}

#[test]
fn test_pii_report() {
    let redactor = PiiRedactor::new();
    let data = json!({
        "customer_email": "john@example.com",
        "backup_email": "backup@example.com",
        "phone": "(555) 123-4567",
        "cost": 8500
    });

    let report = redactor.pii_report(&data);

    assert!(report.pii_detected);
    assert!(report.pii_types.contains(&PiiType::Email));
    assert!(report.pii_types.contains(&PiiType::Phone));
    assert_eq!(report.details[&PiiType::Email].count, 2);
    assert_eq!(report.details[&PiiType::Phone].count, 1);

    let serialized = serde_json::to_value(&report).unwrap();
    assert_eq!(serialized["details"]["email"]["count"], 2);
}
