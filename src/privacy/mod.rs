pub mod compliance;
pub mod redactor;

pub use compliance::{ComplianceReport, ComplianceValidator};
pub use redactor::{PiiDetail, PiiRedactor, PiiReport, PiiType};
