pub mod capture;
pub mod retraining;
pub mod signal;

pub use capture::{CaptureReceipt, DeadLetter, DeadLetterKind, FeedbackSignalCapture};
pub use retraining::RetrainingMonitor;
pub use signal::{Polarity, SignalType};
