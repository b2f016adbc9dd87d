use crate::feedback::signal::SignalType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A feedback signal as it lands in the data lake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSignal {
    pub id: Uuid,
    pub signal_type: SignalType,
    pub timestamp: DateTime<Utc>,
    pub workflow_id: String,
    pub project_id: String,
    pub model_version: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Tool,
    Api,
    Query,
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub kind: DataSourceKind,
    pub name: String,
}

impl DataSource {
    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Tool,
            name: name.into(),
        }
    }

    pub fn api(name: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Api,
            name: name.into(),
        }
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Query,
            name: name.into(),
        }
    }

    pub fn dataset(name: impl Into<String>) -> Self {
        Self {
            kind: DataSourceKind::Dataset,
            name: name.into(),
        }
    }
}

/// What informed a decision: the call shape plus any tools, APIs or queries it touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSources {
    pub function_signature: String,
    pub arguments: BTreeMap<String, String>,
    pub sources: Vec<DataSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: Uuid,
    pub decision: String,
    pub reasoning: String,
    pub data_sources: DataSources,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub function: String,
    pub module: String,
    pub workflow_id: Option<String>,
    pub flagged_for_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerReason {
    SimilarPatterns { pattern: String, count: usize },
    AccuracyDrift { baseline_mape: f64, current_mape: f64, samples: usize },
    LowConfidence { ratio: f64, low_confidence: usize, decisions: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingTrigger {
    pub reason: TriggerReason,
    pub detected_at: DateTime<Utc>,
    pub model_version: String,
}

/// Events handed to a [`crate::domain::ports::Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlywheelEvent {
    RetrainingTriggered(RetrainingTrigger),
    ReviewRequested(ProvenanceRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl ObjectMetadata {
    pub fn json() -> Self {
        Self {
            content_type: "application/json".to_string(),
            ..Default::default()
        }
    }

    pub fn ndjson() -> Self {
        Self {
            content_type: "application/x-ndjson".to_string(),
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
