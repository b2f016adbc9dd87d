use crate::domain::model::{FlywheelEvent, TriggerReason};
use crate::domain::ports::Notifier;
use crate::utils::error::{FlywheelError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;

/// Writes events to the tracing log. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &FlywheelEvent) -> Result<()> {
        match event {
            FlywheelEvent::RetrainingTriggered(trigger) => match &trigger.reason {
                TriggerReason::SimilarPatterns { pattern, count } => {
                    tracing::warn!("🔁 Retraining triggered: {} similar signals for {}", count, pattern);
                }
                TriggerReason::AccuracyDrift {
                    baseline_mape,
                    current_mape,
                    samples,
                } => {
                    tracing::warn!(
                        "🔁 Retraining triggered: MAPE drifted from {:.1}% to {:.1}% over {} samples",
                        baseline_mape,
                        current_mape,
                        samples
                    );
                }
                TriggerReason::LowConfidence {
                    ratio,
                    low_confidence,
                    decisions,
                } => {
                    tracing::warn!(
                        "🔁 Retraining triggered: {}/{} decisions below confidence threshold ({:.0}%)",
                        low_confidence,
                        decisions,
                        ratio * 100.0
                    );
                }
            },
            FlywheelEvent::ReviewRequested(record) => {
                tracing::warn!(
                    function = %record.function,
                    confidence = record.confidence,
                    "⚠️ Low confidence decision flagged for review: {}",
                    record.decision
                );
            }
        }
        Ok(())
    }
}

/// POSTs each event as JSON to an HTTP endpoint (review queue, retraining job, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &FlywheelEvent) -> Result<()> {
        tracing::debug!("Posting flywheel event to {}", self.url);
        let response = self.client.post(&self.url).json(event).send().await?;

        if !response.status().is_success() {
            return Err(FlywheelError::NotificationError {
                message: format!("Webhook {} returned {}", self.url, response.status()),
            });
        }
        Ok(())
    }
}

/// Keeps every event in memory. Handy for embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<FlywheelEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FlywheelEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &FlywheelEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}
