pub mod cli;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod toml_config;

pub use toml_config::{
    DataLakeConfig, FlywheelConfig, NotificationConfig, PrivacyConfig, ProvenanceConfig,
    RetrainingConfig,
};
