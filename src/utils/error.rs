use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlywheelError {
    #[error("Webhook request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Unknown signal type: {value}")]
    InvalidSignalType { value: String },

    #[error("Compliance check failed: {}", issues.join("; "))]
    ComplianceError { issues: Vec<String> },

    #[error("Notification failed: {message}")]
    NotificationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Network,
    Data,
    Privacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlywheelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlywheelError::MissingConfigError { .. }
            | FlywheelError::InvalidConfigValueError { .. }
            | FlywheelError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            FlywheelError::IoError(_) | FlywheelError::StorageError { .. } => {
                ErrorCategory::Storage
            }
            FlywheelError::HttpError(_) | FlywheelError::NotificationError { .. } => {
                ErrorCategory::Network
            }
            FlywheelError::SerializationError(_) | FlywheelError::InvalidSignalType { .. } => {
                ErrorCategory::Data
            }
            FlywheelError::ComplianceError { .. } => ErrorCategory::Privacy,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
            // PII 外洩風險，一律視為最高等級
            ErrorCategory::Privacy => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FlywheelError::MissingConfigError { .. } => {
                "Add the missing field to the TOML config or set the matching environment variable"
            }
            FlywheelError::InvalidConfigValueError { .. }
            | FlywheelError::ConfigValidationError { .. } => "Check the configuration file for typos and invalid values",
            FlywheelError::IoError(_) | FlywheelError::StorageError { .. } => {
                "Verify the data lake path or bucket exists and is writable"
            }
            FlywheelError::HttpError(_) | FlywheelError::NotificationError { .. } => {
                "Check that the webhook endpoint is reachable and retry"
            }
            FlywheelError::SerializationError(_) => "Make sure the input is valid JSON",
            FlywheelError::InvalidSignalType { .. } => {
                "Use one of the predefined signal types, e.g. estimate_accepted or cost_overrun"
            }
            FlywheelError::ComplianceError { .. } => {
                "Redact the payload before storing it in the data lake"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Storage => format!("Could not access the data lake: {}", self),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Data => format!("Invalid input data: {}", self),
            ErrorCategory::Privacy => format!("Data rejected for privacy reasons: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlywheelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_category() {
        let err = FlywheelError::ComplianceError {
            issues: vec!["PII detected: email".to_string()],
        };
        assert_eq!(err.category(), ErrorCategory::Privacy);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.to_string(), "Compliance check failed: PII detected: email");

        let err = FlywheelError::NotificationError {
            message: "503".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_user_friendly_message_mentions_cause() {
        let err = FlywheelError::InvalidSignalType {
            value: "thumbs_up".to_string(),
        };
        assert!(err.user_friendly_message().contains("thumbs_up"));
    }
}
