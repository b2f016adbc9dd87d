//! PII detection and redaction for data headed to the data lake.
//!
//! Covers SSNs, credit card numbers, email addresses and phone numbers, with
//! IP addresses as an opt-in pattern. Identifying fields such as customer names
//! are replaced by deterministic pseudonyms so records stay joinable.

use crate::config::toml_config::PrivacyConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Ssn,
    CreditCard,
    Email,
    Phone,
    IpAddress,
}

impl PiiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Ssn => "ssn",
            PiiType::CreditCard => "credit_card",
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::IpAddress => "ip_address",
        }
    }

    pub fn replacement(&self) -> &'static str {
        match self {
            PiiType::Ssn => "[REDACTED_SSN]",
            PiiType::CreditCard => "[REDACTED_CC]",
            PiiType::Email => "[REDACTED_EMAIL]",
            PiiType::Phone => "[REDACTED_PHONE]",
            PiiType::IpAddress => "[REDACTED_IP]",
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct PiiPattern {
    pii_type: PiiType,
    regex: Regex,
}

// 順序很重要：SSN 與信用卡要在電話之前處理
const PATTERN_SOURCES: &[(PiiType, &str)] = &[
    (PiiType::Ssn, r"\b\d{3}-\d{2}-\d{4}\b"),
    (
        PiiType::CreditCard,
        r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
    ),
    (
        PiiType::Email,
        r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b",
    ),
    (PiiType::Phone, r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
    (PiiType::IpAddress, r"\b(?:\d{1,3}\.){3}\d{1,3}\b"),
];

fn builtin_patterns() -> &'static [PiiPattern] {
    static PATTERNS: OnceLock<Vec<PiiPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PATTERN_SOURCES
            .iter()
            .map(|(pii_type, source)| PiiPattern {
                pii_type: *pii_type,
                regex: Regex::new(source).unwrap(),
            })
            .collect()
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetail {
    pub count: usize,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiReport {
    pub pii_detected: bool,
    pub pii_types: Vec<PiiType>,
    pub details: BTreeMap<PiiType, PiiDetail>,
}

pub struct PiiRedactor {
    enabled: Vec<PiiType>,
    anonymize_names: bool,
    anonymize_fields: BTreeMap<String, String>,
    cache: Mutex<HashMap<String, String>>,
}

impl PiiRedactor {
    pub fn new() -> Self {
        Self::from_config(&PrivacyConfig::default())
    }

    pub fn from_config(config: &PrivacyConfig) -> Self {
        let enabled = PATTERN_SOURCES
            .iter()
            .map(|(pii_type, _)| *pii_type)
            .filter(|t| *t != PiiType::IpAddress || config.detect_ip_addresses)
            .collect();

        Self {
            enabled,
            anonymize_names: config.anonymize_names,
            anonymize_fields: config.anonymize_fields.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ip_addresses(mut self) -> Self {
        if !self.enabled.contains(&PiiType::IpAddress) {
            self.enabled.push(PiiType::IpAddress);
        }
        self
    }

    fn patterns(&self) -> impl Iterator<Item = &'static PiiPattern> + '_ {
        builtin_patterns()
            .iter()
            .filter(|p| self.enabled.contains(&p.pii_type))
    }

    /// Redact PII from any JSON value. Keys, array lengths and non-string leaves are untouched.
    pub fn redact(&self, data: &Value) -> Value {
        match data {
            Value::String(text) => Value::String(self.redact_str(text)),
            Value::Object(map) => {
                let redacted: Map<String, Value> = map
                    .iter()
                    .map(|(key, value)| (key.clone(), self.redact_field(key, value)))
                    .collect();
                Value::Object(redacted)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            other => other.clone(),
        }
    }

    fn redact_field(&self, key: &str, value: &Value) -> Value {
        if self.anonymize_names {
            if let (Some(category), Value::String(identifier)) =
                (self.anonymize_fields.get(key), value)
            {
                return Value::String(self.anonymize(identifier, category));
            }
        }
        self.redact(value)
    }

    /// Replace matches until no pattern matches. A replacement can expose a
    /// match for a pattern that already ran, e.g. `123-45-6789555-123-4567`.
    pub fn redact_str(&self, text: &str) -> String {
        let mut text = text.to_string();
        loop {
            let mut changed = false;
            for pattern in self.patterns() {
                if let Cow::Owned(replaced) =
                    pattern.regex.replace_all(&text, pattern.pii_type.replacement())
                {
                    text = replaced;
                    changed = true;
                }
            }
            if !changed {
                return text;
            }
        }
    }

    /// Deterministic pseudonym such as `customer_6cea57`.
    pub fn anonymize(&self, identifier: &str, category: &str) -> String {
        let cache_key = format!("{}:{}", category, identifier);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(&cache_key) {
            return hit.clone();
        }

        let digest = hex::encode(Sha256::digest(identifier.as_bytes()));
        let anonymized = format!("{}_{}", category, &digest[..6]);
        cache.insert(cache_key, anonymized.clone());
        anonymized
    }

    pub fn detect_pii(&self, data: &Value) -> Vec<PiiType> {
        let leaves = string_leaves(data);
        self.patterns()
            .filter(|p| leaves.iter().any(|text| p.regex.is_match(text)))
            .map(|p| p.pii_type)
            .collect()
    }

    pub fn detect_pii_str(&self, text: &str) -> Vec<PiiType> {
        self.patterns()
            .filter(|p| p.regex.is_match(text))
            .map(|p| p.pii_type)
            .collect()
    }

    pub fn validate_no_pii(&self, data: &Value) -> bool {
        self.detect_pii(data).is_empty()
    }

    pub fn pii_report(&self, data: &Value) -> PiiReport {
        let leaves = string_leaves(data);
        let mut details = BTreeMap::new();
        let mut pii_types = Vec::new();

        for pattern in self.patterns() {
            let matches: Vec<&str> = leaves
                .iter()
                .flat_map(|text| pattern.regex.find_iter(text).map(|m| m.as_str()))
                .collect();
            if matches.is_empty() {
                continue;
            }
            pii_types.push(pattern.pii_type);
            details.insert(
                pattern.pii_type,
                PiiDetail {
                    count: matches.len(),
                    examples: matches.iter().take(3).map(|m| m.to_string()).collect(),
                },
            );
        }

        PiiReport {
            pii_detected: !pii_types.is_empty(),
            pii_types,
            details,
        }
    }
}

impl Default for PiiRedactor {
    fn default() -> Self {
        Self::new()
    }
}

fn string_leaves(value: &Value) -> Vec<&str> {
    fn walk<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
        match value {
            Value::String(text) => out.push(text),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(value, &mut out);
    out
}
