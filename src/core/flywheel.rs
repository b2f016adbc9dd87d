use crate::adapters::{LogNotifier, WebhookNotifier};
use crate::config::toml_config::{FlywheelConfig, NotificationConfig};
use crate::domain::ports::{Notifier, Storage};
use crate::feedback::{FeedbackSignalCapture, RetrainingMonitor};
use crate::privacy::{ComplianceValidator, PiiRedactor};
use crate::provenance::ProvenanceTracker;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!("🔔 Flywheel events will be posted to {}", url);
            let notifier =
                WebhookNotifier::new(url.clone(), Duration::from_secs(config.timeout_seconds))?;
            Ok(Arc::new(notifier))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

/// Wires provenance tracking, signal capture and retraining detection over one storage backend.
///
/// Tracker and capture share the redactor, the retraining monitor and the notifier,
/// so low-confidence decisions and negative signals feed the same trigger logic.
pub struct Flywheel<S: Storage + Clone> {
    config: FlywheelConfig,
    redactor: Arc<PiiRedactor>,
    monitor: Arc<RetrainingMonitor>,
    tracker: ProvenanceTracker<S>,
    capture: FeedbackSignalCapture<S>,
}

impl<S: Storage + Clone> Flywheel<S> {
    pub fn new(storage: S, config: FlywheelConfig) -> Result<Self> {
        let notifier = notifier_from_config(&config.notifications)?;
        Ok(Self::with_notifier(storage, config, notifier))
    }

    pub fn with_notifier(storage: S, config: FlywheelConfig, notifier: Arc<dyn Notifier>) -> Self {
        let redactor = Arc::new(PiiRedactor::from_config(&config.privacy));
        let monitor = Arc::new(RetrainingMonitor::new(
            config.retraining.clone(),
            config.provenance.low_confidence_threshold,
            config.provenance.model_version.clone(),
        ));

        let tracker = ProvenanceTracker::with_shared(
            storage.clone(),
            &config,
            redactor.clone(),
            Some(monitor.clone()),
            notifier.clone(),
        );
        let capture = FeedbackSignalCapture::with_shared(
            storage,
            &config,
            redactor.clone(),
            Some(monitor.clone()),
            notifier,
        );

        Self {
            config,
            redactor,
            monitor,
            tracker,
            capture,
        }
    }

    pub fn config(&self) -> &FlywheelConfig {
        &self.config
    }

    pub fn tracker(&self) -> &ProvenanceTracker<S> {
        &self.tracker
    }

    pub fn capture(&self) -> &FeedbackSignalCapture<S> {
        &self.capture
    }

    pub fn redactor(&self) -> &PiiRedactor {
        &self.redactor
    }

    pub fn monitor(&self) -> &RetrainingMonitor {
        &self.monitor
    }

    pub fn compliance(&self) -> ComplianceValidator {
        ComplianceValidator::from_config(self.redactor.clone(), &self.config.privacy)
    }

    /// Flush buffered signals and replay failed uploads once. Returns every key written.
    pub async fn shutdown(&self) -> Result<Vec<String>> {
        let mut written = self.capture.flush().await?;
        let replayed = self.capture.retry_dead_letters().await;
        if !replayed.is_empty() {
            tracing::info!("♻️ Replayed {} dead-lettered uploads", replayed.len());
        }
        written.extend(replayed);
        Ok(written)
    }
}
