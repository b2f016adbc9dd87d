pub mod flywheel;

pub use crate::domain::model::{FeedbackSignal, FlywheelEvent, ProvenanceRecord, RetrainingTrigger};
pub use crate::domain::ports::{Notifier, Storage};
pub use crate::utils::error::Result;
