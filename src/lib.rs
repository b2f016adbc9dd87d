pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod feedback;
pub mod privacy;
pub mod provenance;
pub mod utils;

pub use adapters::{LogNotifier, MemoryStorage, RecordingNotifier, WebhookNotifier};
pub use config::{cli::LocalStorage, FlywheelConfig};

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use crate::core::flywheel::Flywheel;
pub use domain::model::{
    DataSource, FeedbackSignal, FlywheelEvent, ProvenanceRecord, RetrainingTrigger, TriggerReason,
};
pub use feedback::{CaptureReceipt, FeedbackSignalCapture, RetrainingMonitor, SignalType};
pub use privacy::{ComplianceReport, ComplianceValidator, PiiRedactor, PiiReport, PiiType};
pub use provenance::{DecisionContext, ProvenanceQuery, ProvenanceTracker};
pub use utils::error::{FlywheelError, Result};
