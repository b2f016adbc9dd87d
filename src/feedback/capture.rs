use crate::config::toml_config::{DataLakeConfig, FlywheelConfig};
use crate::domain::model::{FeedbackSignal, FlywheelEvent, ObjectMetadata, RetrainingTrigger};
use crate::domain::ports::{Notifier, Storage};
use crate::feedback::retraining::RetrainingMonitor;
use crate::feedback::signal::SignalType;
use crate::privacy::{ComplianceValidator, PiiRedactor};
use crate::utils::error::Result;
use crate::adapters::LogNotifier;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub prefix: String,
    pub compression: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub batch_size: usize,
    pub model_version: String,
}

impl CaptureSettings {
    pub fn from_config(data_lake: &DataLakeConfig, model_version: &str) -> Self {
        Self {
            prefix: data_lake.prefix.trim_matches('/').to_string(),
            compression: data_lake.compression,
            retry_attempts: data_lake.retry_attempts.max(1),
            retry_delay: Duration::from_millis(data_lake.retry_delay_ms),
            batch_size: data_lake.batch_size.max(1),
            model_version: model_version.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterKind {
    /// Storage kept failing after every retry; the payload can be replayed.
    UploadFailed,
    /// Payload failed the compliance gate and was never written.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub kind: DeadLetterKind,
    pub key: String,
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
    pub reason: String,
    pub signal_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CaptureReceipt {
    pub signal: FeedbackSignal,
    /// Data lake key, or `None` when the signal was buffered or dead-lettered.
    pub object_key: Option<String>,
    pub triggers: Vec<RetrainingTrigger>,
}

/// Captures positive, negative and variance feedback signals into the data lake.
///
/// Every signal is redacted, checked for compliance, written under
/// `signals/{type}/{YYYY/MM/DD}/` and fed to the retraining monitor.
pub struct FeedbackSignalCapture<S: Storage> {
    storage: S,
    settings: CaptureSettings,
    redactor: Arc<PiiRedactor>,
    validator: ComplianceValidator,
    monitor: Option<Arc<RetrainingMonitor>>,
    notifier: Arc<dyn Notifier>,
    buffer: Mutex<Vec<FeedbackSignal>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
}

impl<S: Storage> FeedbackSignalCapture<S> {
    pub fn new(storage: S, config: &FlywheelConfig) -> Self {
        let redactor = Arc::new(PiiRedactor::from_config(&config.privacy));
        let monitor = Arc::new(RetrainingMonitor::new(
            config.retraining.clone(),
            config.provenance.low_confidence_threshold,
            config.provenance.model_version.clone(),
        ));
        Self::with_shared(storage, config, redactor, Some(monitor), Arc::new(LogNotifier))
    }

    pub fn with_shared(
        storage: S,
        config: &FlywheelConfig,
        redactor: Arc<PiiRedactor>,
        monitor: Option<Arc<RetrainingMonitor>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let validator = ComplianceValidator::from_config(redactor.clone(), &config.privacy);
        Self {
            storage,
            settings: CaptureSettings::from_config(&config.data_lake, &config.provenance.model_version),
            redactor,
            validator,
            monitor,
            notifier,
            buffer: Mutex::new(Vec::new()),
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Run `handler` and capture its output as a signal.
    ///
    /// `workflow_id` and `project_id` are looked up in `input` first, then in
    /// the handler's output, and default to `"unknown"`.
    pub async fn capture_signal<T, F>(
        &self,
        signal_type: SignalType,
        input: &Value,
        handler: F,
    ) -> Result<(T, CaptureReceipt)>
    where
        T: Serialize,
        F: FnOnce() -> T,
    {
        let output = handler();
        let data = serde_json::to_value(&output)?;

        let workflow_id = extract_id("workflow_id", input, &data);
        let project_id = extract_id("project_id", input, &data);

        let receipt = self.ingest(signal_type, workflow_id, project_id, data).await?;
        Ok((output, receipt))
    }

    pub async fn capture_manual_signal(
        &self,
        signal_type: SignalType,
        data: Value,
    ) -> Result<CaptureReceipt> {
        let workflow_id = extract_id("workflow_id", &data, &Value::Null);
        let project_id = extract_id("project_id", &data, &Value::Null);
        self.ingest(signal_type, workflow_id, project_id, data).await
    }

    async fn ingest(
        &self,
        signal_type: SignalType,
        workflow_id: String,
        project_id: String,
        data: Value,
    ) -> Result<CaptureReceipt> {
        // 進入資料湖前先去識別化
        let signal = FeedbackSignal {
            id: Uuid::new_v4(),
            signal_type,
            timestamp: Utc::now(),
            workflow_id: self.redactor.redact_str(&workflow_id),
            project_id: self.redactor.redact_str(&project_id),
            model_version: self.settings.model_version.clone(),
            data: self.redactor.redact(&data),
        };

        let report = self.validator.validate_data_for_storage(&signal.data);
        let object_key = if !report.compliant {
            let reason = report.issues.join("; ");
            tracing::warn!("❌ Signal {} rejected by compliance check: {}", signal.id, reason);
            let body = serde_json::to_vec_pretty(&signal)?;
            self.push_dead_letter(DeadLetter {
                kind: DeadLetterKind::Rejected,
                key: self.signal_key(&signal),
                body,
                metadata: self.signal_metadata(&signal),
                reason,
                signal_ids: vec![signal.id],
            });
            None
        } else if self.settings.batch_size > 1 {
            let full = {
                let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
                buffer.push(signal.clone());
                buffer.len() >= self.settings.batch_size
            };
            if full {
                self.flush().await?;
            }
            None
        } else {
            self.send_to_data_lake(&signal).await?
        };

        let triggers = self.check_retraining_triggers(&signal).await;

        Ok(CaptureReceipt {
            signal,
            object_key,
            triggers,
        })
    }

    async fn send_to_data_lake(&self, signal: &FeedbackSignal) -> Result<Option<String>> {
        let key = self.signal_key(signal);
        let body = self.encode(serde_json::to_vec_pretty(signal)?)?;
        let metadata = self.signal_metadata(signal);

        match self.upload(&key, &body, &metadata).await {
            Ok(()) => {
                tracing::info!("✅ Signal sent to data lake: {}", key);
                Ok(Some(key))
            }
            Err(e) => {
                tracing::error!("❌ Failed to send signal to data lake: {}", e);
                self.push_dead_letter(DeadLetter {
                    kind: DeadLetterKind::UploadFailed,
                    key,
                    body,
                    metadata,
                    reason: e.to_string(),
                    signal_ids: vec![signal.id],
                });
                Ok(None)
            }
        }
    }

    /// Upload buffered signals, one NDJSON object per signal type. Returns the written keys.
    pub async fn flush(&self) -> Result<Vec<String>> {
        let pending = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *buffer)
        };
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: Vec<(SignalType, Vec<FeedbackSignal>)> = Vec::new();
        for signal in pending {
            match groups.iter_mut().find(|(t, _)| *t == signal.signal_type) {
                Some((_, signals)) => signals.push(signal),
                None => groups.push((signal.signal_type, vec![signal])),
            }
        }

        let flushed_at = Utc::now();
        let mut written = Vec::new();
        for (signal_type, signals) in groups {
            let mut lines = String::new();
            for signal in &signals {
                lines.push_str(&serde_json::to_string(signal)?);
                lines.push('\n');
            }

            let key = self.batch_key(signal_type, flushed_at);
            let body = self.encode(lines.into_bytes())?;
            let mut metadata = ObjectMetadata::ndjson()
                .with_tag("signal_type", signal_type.as_str())
                .with_tag("signal_count", signals.len().to_string());
            if self.settings.compression {
                metadata = metadata.with_encoding("gzip");
            }

            match self.upload(&key, &body, &metadata).await {
                Ok(()) => {
                    tracing::info!("✅ Batch of {} signals sent to data lake: {}", signals.len(), key);
                    written.push(key);
                }
                Err(e) => {
                    tracing::error!("❌ Failed to send signal batch to data lake: {}", e);
                    self.push_dead_letter(DeadLetter {
                        kind: DeadLetterKind::UploadFailed,
                        key,
                        body,
                        metadata,
                        reason: e.to_string(),
                        signal_ids: signals.iter().map(|s| s.id).collect(),
                    });
                }
            }
        }

        Ok(written)
    }

    pub fn pending(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replay failed uploads and return the keys delivered. Rejected payloads
    /// stay in the queue.
    pub async fn retry_dead_letters(&self) -> Vec<String> {
        let queued = {
            let mut dead_letters = self.dead_letters.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *dead_letters)
        };

        let mut delivered = Vec::new();
        let mut remaining = Vec::new();
        for letter in queued {
            if letter.kind == DeadLetterKind::Rejected {
                remaining.push(letter);
                continue;
            }
            match self.upload(&letter.key, &letter.body, &letter.metadata).await {
                Ok(()) => delivered.push(letter.key),
                Err(e) => remaining.push(DeadLetter {
                    reason: e.to_string(),
                    ..letter
                }),
            }
        }

        self.dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(remaining);
        delivered
    }

    fn push_dead_letter(&self, letter: DeadLetter) {
        self.dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(letter);
    }

    async fn upload(&self, key: &str, body: &[u8], metadata: &ObjectMetadata) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.storage.write_file(key, body, metadata).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.settings.retry_attempts => {
                    tracing::warn!(
                        "Upload of {} failed (attempt {}/{}): {}",
                        key,
                        attempt,
                        self.settings.retry_attempts,
                        e
                    );
                    tokio::time::sleep(self.settings.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn check_retraining_triggers(&self, signal: &FeedbackSignal) -> Vec<RetrainingTrigger> {
        let Some(monitor) = &self.monitor else {
            return Vec::new();
        };

        let triggers = monitor.observe_signal(signal);
        for trigger in &triggers {
            let event = FlywheelEvent::RetrainingTriggered(trigger.clone());
            if let Err(e) = self.notifier.notify(&event).await {
                tracing::error!("Failed to publish retraining trigger: {}", e);
            }
        }
        triggers
    }

    fn encode(&self, body: Vec<u8>) -> Result<Vec<u8>> {
        if !self.settings.compression {
            return Ok(body);
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        Ok(encoder.finish()?)
    }

    fn key_root(&self) -> String {
        if self.settings.prefix.is_empty() {
            "signals".to_string()
        } else {
            format!("{}/signals", self.settings.prefix)
        }
    }

    /// `signals/{type}/{YYYY/MM/DD}/{HHMMSS.ffffff}-{id}.json[.gz]`
    pub fn signal_key(&self, signal: &FeedbackSignal) -> String {
        format!(
            "{}/{}/{}/{}-{}.{}",
            self.key_root(),
            signal.signal_type,
            signal.timestamp.format("%Y/%m/%d"),
            signal.timestamp.format("%H%M%S%.6f"),
            signal.id,
            if self.settings.compression { "json.gz" } else { "json" }
        )
    }

    fn batch_key(&self, signal_type: SignalType, at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/batch-{}.{}",
            self.key_root(),
            signal_type,
            at.format("%Y/%m/%d"),
            at.format("%H%M%S%.6f"),
            if self.settings.compression { "jsonl.gz" } else { "jsonl" }
        )
    }

    fn signal_metadata(&self, signal: &FeedbackSignal) -> ObjectMetadata {
        let metadata = ObjectMetadata::json()
            .with_tag("signal_type", signal.signal_type.as_str())
            .with_tag("workflow_id", signal.workflow_id.clone());
        if self.settings.compression {
            metadata.with_encoding("gzip")
        } else {
            metadata
        }
    }
}

fn extract_id(field: &str, primary: &Value, fallback: &Value) -> String {
    [primary, fallback]
        .into_iter()
        .find_map(|source| match source.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}
