use crate::adapters::{LogNotifier, MemoryStorage};
use crate::config::toml_config::FlywheelConfig;
use crate::domain::model::{DataSource, DataSources, FlywheelEvent, ObjectMetadata, ProvenanceRecord};
use crate::domain::ports::{Notifier, Storage};
use crate::feedback::retraining::RetrainingMonitor;
use crate::privacy::PiiRedactor;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

const SUMMARY_KEYS: [&str; 4] = ["total_cost", "status", "approved", "recommended"];
const DECISION_PREVIEW_CHARS: usize = 100;
const ARGUMENT_PREVIEW_CHARS: usize = 50;
const NO_REASONING: &str = "No explicit reasoning provided";

/// Describes the decision being tracked: who made it and from what inputs.
#[derive(Debug, Clone, Default)]
pub struct DecisionContext {
    pub function: String,
    pub module: String,
    pub workflow_id: Option<String>,
    pub arguments: Vec<(String, Value)>,
    pub sources: Vec<DataSource>,
}

impl DecisionContext {
    pub fn new(function: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            module: module.into(),
            ..Default::default()
        }
    }

    pub fn workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.arguments.push((name.into(), value));
        self
    }

    pub fn source(mut self, source: DataSource) -> Self {
        self.sources.push(source);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceQuery {
    pub workflow_id: Option<String>,
    pub decision_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ProvenanceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn decision_type(mut self, function: impl Into<String>) -> Self {
        self.decision_type = Some(function.into());
        self
    }

    pub fn since(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(end);
        self
    }

    pub fn matches(&self, record: &ProvenanceRecord) -> bool {
        if let Some(workflow_id) = &self.workflow_id {
            if record.workflow_id.as_ref() != Some(workflow_id) {
                return false;
            }
        }
        if let Some(function) = &self.decision_type {
            if &record.function != function {
                return false;
            }
        }
        if self.start_time.is_some_and(|start| record.timestamp < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| record.timestamp > end) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
struct TrackerSettings {
    prefix: String,
    model_version: String,
    low_confidence_threshold: f64,
    default_confidence: f64,
    persist: bool,
}

/// Records what an agent decided, why, from which data, and how confident it was.
pub struct ProvenanceTracker<S: Storage> {
    storage: S,
    settings: TrackerSettings,
    redactor: Arc<PiiRedactor>,
    monitor: Option<Arc<RetrainingMonitor>>,
    notifier: Arc<dyn Notifier>,
    records: RwLock<Vec<ProvenanceRecord>>,
    review_queue: Mutex<Vec<ProvenanceRecord>>,
}

impl ProvenanceTracker<MemoryStorage> {
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new(), &FlywheelConfig::default())
    }
}

impl<S: Storage> ProvenanceTracker<S> {
    pub fn new(storage: S, config: &FlywheelConfig) -> Self {
        let redactor = Arc::new(PiiRedactor::from_config(&config.privacy));
        Self::with_shared(storage, config, redactor, None, Arc::new(LogNotifier))
    }

    pub fn with_shared(
        storage: S,
        config: &FlywheelConfig,
        redactor: Arc<PiiRedactor>,
        monitor: Option<Arc<RetrainingMonitor>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            storage,
            settings: TrackerSettings {
                prefix: config.data_lake.prefix.trim_matches('/').to_string(),
                model_version: config.provenance.model_version.clone(),
                low_confidence_threshold: config.provenance.low_confidence_threshold,
                default_confidence: config.provenance.default_confidence,
                persist: config.provenance.persist,
            },
            redactor,
            monitor,
            notifier,
            records: RwLock::new(Vec::new()),
            review_queue: Mutex::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Run a decision and record its provenance. The output is returned unchanged.
    pub async fn track_decision<T, F>(&self, ctx: DecisionContext, decide: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        let output = decide();
        self.record_decision(ctx, &output).await?;
        Ok(output)
    }

    pub async fn track_async<T, Fut>(&self, ctx: DecisionContext, decision: Fut) -> Result<T>
    where
        T: Serialize,
        Fut: Future<Output = T>,
    {
        let output = decision.await;
        self.record_decision(ctx, &output).await?;
        Ok(output)
    }

    pub async fn record_decision<T: Serialize>(
        &self,
        ctx: DecisionContext,
        output: &T,
    ) -> Result<ProvenanceRecord> {
        let value = serde_json::to_value(output)?;
        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(self.settings.default_confidence);

        let record = ProvenanceRecord {
            id: Uuid::new_v4(),
            decision: self
                .redactor
                .redact_str(&format_decision(&ctx.function, &value)),
            reasoning: self.redactor.redact_str(
                value
                    .get("reasoning")
                    .and_then(Value::as_str)
                    .unwrap_or(NO_REASONING),
            ),
            data_sources: self.identify_data_sources(&ctx),
            model_version: self.settings.model_version.clone(),
            timestamp: Utc::now(),
            confidence,
            function: ctx.function,
            module: ctx.module,
            workflow_id: ctx.workflow_id,
            flagged_for_review: confidence < self.settings.low_confidence_threshold,
        };

        self.store_provenance(&record).await;

        if record.flagged_for_review {
            self.flag_for_review(&record).await;
        }

        if let Some(monitor) = &self.monitor {
            if let Some(trigger) = monitor.observe_decision(record.confidence) {
                self.publish(&FlywheelEvent::RetrainingTriggered(trigger)).await;
            }
        }

        Ok(record)
    }

    fn identify_data_sources(&self, ctx: &DecisionContext) -> DataSources {
        // 參數可能含個資，先去識別化再截斷
        let arguments: BTreeMap<String, String> = ctx
            .arguments
            .iter()
            .map(|(name, value)| {
                let redacted = self.redactor.redact(value);
                (name.clone(), truncate(&value_text(&redacted), ARGUMENT_PREVIEW_CHARS))
            })
            .collect();

        let signature_args: Vec<String> = ctx
            .arguments
            .iter()
            .map(|(name, _)| arguments.get(name).cloned().unwrap_or_default())
            .collect();

        DataSources {
            function_signature: format!("{}({})", ctx.function, signature_args.join(", ")),
            arguments,
            sources: ctx.sources.clone(),
        }
    }

    async fn store_provenance(&self, record: &ProvenanceRecord) {
        if self.settings.persist {
            let key = self.record_key(record);
            let stored = match serde_json::to_vec_pretty(record) {
                Ok(body) => self.storage.write_file(&key, &body, &ObjectMetadata::json()).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = stored {
                tracing::error!("Failed to persist provenance {}: {}", key, e);
            }
        }

        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        tracing::info!(
            "📋 Provenance stored: {} (confidence: {:.2})",
            record.function,
            record.confidence
        );
    }

    async fn flag_for_review(&self, record: &ProvenanceRecord) {
        self.review_queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        self.publish(&FlywheelEvent::ReviewRequested(record.clone())).await;
    }

    async fn publish(&self, event: &FlywheelEvent) {
        if let Err(e) = self.notifier.notify(event).await {
            tracing::error!("Failed to publish flywheel event: {}", e);
        }
    }

    fn key_root(&self) -> String {
        if self.settings.prefix.is_empty() {
            "provenance".to_string()
        } else {
            format!("{}/provenance", self.settings.prefix)
        }
    }

    /// `provenance/{function}/{YYYY/MM/DD}/{id}.json`
    pub fn record_key(&self, record: &ProvenanceRecord) -> String {
        format!(
            "{}/{}/{}/{}.json",
            self.key_root(),
            record.function,
            record.timestamp.format("%Y/%m/%d"),
            record.id
        )
    }

    /// Load persisted records not yet in the in-memory index. Returns how many were added.
    pub async fn restore(&self) -> Result<usize> {
        let keys = self.storage.list(&format!("{}/", self.key_root())).await?;
        let mut loaded = Vec::new();
        for key in keys.iter().filter(|k| k.ends_with(".json")) {
            let body = self.storage.read_file(key).await?;
            match serde_json::from_slice::<ProvenanceRecord>(&body) {
                Ok(record) => loaded.push(record),
                Err(e) => tracing::warn!("Skipping unreadable provenance object {}: {}", key, e),
            }
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        for record in loaded {
            if !records.iter().any(|r| r.id == record.id) {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.timestamp);
        Ok(records.len() - before)
    }

    pub fn query(&self, query: &ProvenanceQuery) -> Vec<ProvenanceRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect()
    }

    pub fn pending_reviews(&self) -> Vec<ProvenanceRecord> {
        self.review_queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn format_decision(function: &str, output: &Value) -> String {
    match output {
        Value::Object(map) => {
            let summary: Map<String, Value> = SUMMARY_KEYS
                .iter()
                .filter_map(|key| map.get(*key).map(|v| (key.to_string(), v.clone())))
                .collect();
            format!("{} decided: {}", function, Value::Object(summary))
        }
        other => format!(
            "{} returned: {}",
            function,
            truncate(&value_text(other), DECISION_PREVIEW_CHARS)
        ),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_decision_keeps_summary_keys() {
        let output = json!({
            "total_cost": 7500.0,
            "approved": true,
            "reasoning": "Based on $1.50/sqft",
            "confidence": 0.87,
        });
        let decision = format_decision("estimate_cost", &output);
        assert!(decision.starts_with("estimate_cost decided: {"));
        assert!(decision.contains(r#""approved":true"#));
        assert!(decision.contains(r#""total_cost":7500.0"#));
        assert!(!decision.contains("reasoning"));
        assert!(!decision.contains("confidence"));
    }

    #[test]
    fn test_format_decision_truncates_scalars() {
        let long = "x".repeat(250);
        let decision = format_decision("summarize", &json!(long));
        assert_eq!(decision, format!("summarize returned: {}", "x".repeat(100)));

        assert_eq!(format_decision("count", &json!(42)), "count returned: 42");
    }

    #[test]
    fn test_query_filters_are_conjunctive() {
        let now = Utc::now();
        let record = ProvenanceRecord {
            id: Uuid::new_v4(),
            decision: String::new(),
            reasoning: NO_REASONING.to_string(),
            data_sources: DataSources::default(),
            model_version: "m".to_string(),
            timestamp: now,
            confidence: 0.9,
            function: "estimate_cost".to_string(),
            module: "estimator".to_string(),
            workflow_id: Some("wf-1".to_string()),
            flagged_for_review: false,
        };

        assert!(ProvenanceQuery::new().matches(&record));
        assert!(ProvenanceQuery::new()
            .workflow("wf-1")
            .decision_type("estimate_cost")
            .since(now)
            .until(now)
            .matches(&record));
        assert!(!ProvenanceQuery::new().workflow("wf-2").matches(&record));
        assert!(!ProvenanceQuery::new()
            .decision_type("estimate_cost")
            .since(now + chrono::Duration::seconds(1))
            .matches(&record));
    }

    #[tokio::test]
    async fn test_argument_previews_are_redacted_and_truncated() {
        let tracker = ProvenanceTracker::in_memory();
        let ctx = DecisionContext::new("schedule_visit", "scheduler")
            .arg("contact", "john@example.com")
            .arg("notes", "n".repeat(80));

        let record = tracker.record_decision(ctx, &json!({"status": "booked"})).await.unwrap();

        assert_eq!(record.data_sources.arguments["contact"], "[REDACTED_EMAIL]");
        assert_eq!(record.data_sources.arguments["notes"].chars().count(), 50);
        assert!(record
            .data_sources
            .function_signature
            .starts_with("schedule_visit([REDACTED_EMAIL], nnnn"));
    }
}
