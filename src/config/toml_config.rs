use crate::utils::error::{FlywheelError, Result};
use crate::utils::validation::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_MODEL_VERSION: &str = "claude-3-5-sonnet-20241022-v2:0";
pub const MODEL_VERSION_ENV: &str = "FLYWHEEL_MODEL_VERSION";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlywheelConfig {
    pub data_lake: DataLakeConfig,
    pub provenance: ProvenanceConfig,
    pub privacy: PrivacyConfig,
    pub retraining: RetrainingConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLakeConfig {
    pub bucket: String,
    pub region: String,
    /// Key prefix shared by signals and provenance, e.g. `prod`.
    pub prefix: String,
    /// Root directory used by the CLI's local data lake.
    pub local_path: String,
    pub compression: bool,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub batch_size: usize,
}

impl Default for DataLakeConfig {
    fn default() -> Self {
        Self {
            bucket: "zevbit-data-flywheel".to_string(),
            region: "us-east-1".to_string(),
            prefix: String::new(),
            local_path: "./data-lake".to_string(),
            compression: false,
            retry_attempts: 3,
            retry_delay_ms: 200,
            batch_size: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub model_version: String,
    pub low_confidence_threshold: f64,
    pub default_confidence: f64,
    pub persist: bool,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            low_confidence_threshold: 0.7,
            default_confidence: 0.8,
            persist: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub anonymize_names: bool,
    pub detect_ip_addresses: bool,
    /// Field name → pseudonym category, e.g. `customer_name = "customer"`.
    pub anonymize_fields: BTreeMap<String, String>,
    pub max_payload_bytes: usize,
    pub required_fields: Vec<String>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        let anonymize_fields = [
            ("customer_name", "customer"),
            ("contractor_name", "contractor"),
            ("address", "location"),
        ]
        .into_iter()
        .map(|(field, category)| (field.to_string(), category.to_string()))
        .collect();

        Self {
            anonymize_names: true,
            detect_ip_addresses: false,
            anonymize_fields,
            max_payload_bytes: crate::privacy::compliance::DEFAULT_MAX_PAYLOAD_BYTES,
            required_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainingConfig {
    pub enabled: bool,
    pub pattern_threshold: usize,
    pub pattern_fields: Vec<String>,
    pub baseline_mape: f64,
    pub drift_mape: f64,
    pub min_samples: usize,
    pub window_size: usize,
    pub low_confidence_ratio: f64,
    pub min_decisions: usize,
}

impl Default for RetrainingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern_threshold: 10,
            pattern_fields: vec!["project_type".to_string(), "soil_type".to_string()],
            baseline_mape: 6.0,
            drift_mape: 10.0,
            min_samples: 10,
            window_size: 100,
            low_confidence_ratio: 0.2,
            min_decisions: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_seconds: 10,
        }
    }
}

impl FlywheelConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FlywheelError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| FlywheelError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// 替換環境變數 (例如 ${WEBHOOK_URL})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(version) = std::env::var(MODEL_VERSION_ENV) {
            if !version.trim().is_empty() {
                self.provenance.model_version = version;
            }
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        let lake = &self.data_lake;
        validate_s3_bucket_name("data_lake.bucket", &lake.bucket)?;
        validate_aws_region("data_lake.region", &lake.region)?;
        validate_path("data_lake.local_path", &lake.local_path)?;
        validate_key_prefix("data_lake.prefix", &lake.prefix)?;
        validate_range("data_lake.retry_attempts", lake.retry_attempts, 1, 10)?;
        validate_positive_number("data_lake.batch_size", lake.batch_size, 1)?;

        let provenance = &self.provenance;
        validate_non_empty_string("provenance.model_version", &provenance.model_version)?;
        validate_range(
            "provenance.low_confidence_threshold",
            provenance.low_confidence_threshold,
            0.0,
            1.0,
        )?;
        validate_range(
            "provenance.default_confidence",
            provenance.default_confidence,
            0.0,
            1.0,
        )?;

        validate_positive_number("privacy.max_payload_bytes", self.privacy.max_payload_bytes, 1)?;

        let retraining = &self.retraining;
        validate_positive_number("retraining.pattern_threshold", retraining.pattern_threshold, 1)?;
        validate_positive_number("retraining.min_samples", retraining.min_samples, 1)?;
        validate_positive_number("retraining.min_decisions", retraining.min_decisions, 1)?;
        validate_range(
            "retraining.low_confidence_ratio",
            retraining.low_confidence_ratio,
            0.0,
            1.0,
        )?;
        if retraining.drift_mape <= retraining.baseline_mape {
            return Err(FlywheelError::InvalidConfigValueError {
                field: "retraining.drift_mape".to_string(),
                value: retraining.drift_mape.to_string(),
                reason: format!(
                    "Drift threshold must exceed baseline MAPE {}",
                    retraining.baseline_mape
                ),
            });
        }
        let smallest_window = retraining.min_samples.max(retraining.min_decisions);
        if retraining.window_size < smallest_window {
            return Err(FlywheelError::InvalidConfigValueError {
                field: "retraining.window_size".to_string(),
                value: retraining.window_size.to_string(),
                reason: format!("Window must hold at least {} entries", smallest_window),
            });
        }

        if let Some(url) = &self.notifications.webhook_url {
            validate_url("notifications.webhook_url", url)?;
        }
        validate_positive_number(
            "notifications.timeout_seconds",
            self.notifications.timeout_seconds as usize,
            1,
        )?;

        Ok(())
    }
}

impl Validate for FlywheelConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[data_lake]
bucket = "zevbit-data-flywheel-123456"
prefix = "prod"
compression = true
batch_size = 25

[provenance]
low_confidence_threshold = 0.75

[retraining]
pattern_fields = ["soil_type"]
"#;

        let config = FlywheelConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.data_lake.bucket, "zevbit-data-flywheel-123456");
        assert_eq!(config.data_lake.region, "us-east-1");
        assert!(config.data_lake.compression);
        assert_eq!(config.data_lake.batch_size, 25);
        assert_eq!(config.provenance.low_confidence_threshold, 0.75);
        assert_eq!(config.provenance.default_confidence, 0.8);
        assert_eq!(config.retraining.pattern_fields, vec!["soil_type"]);
        assert_eq!(config.retraining.pattern_threshold, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FlywheelConfig::from_toml_str("").unwrap();
        assert_eq!(config.privacy, PrivacyConfig::default());
        assert_eq!(config.privacy.anonymize_fields["customer_name"], "customer");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_FLYWHEEL_WEBHOOK", "https://hooks.example.com/retrain");

        let toml_content = r#"
[notifications]
webhook_url = "${TEST_FLYWHEEL_WEBHOOK}"
"#;

        let config = FlywheelConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://hooks.example.com/retrain")
        );

        std::env::remove_var("TEST_FLYWHEEL_WEBHOOK");
    }

    #[test]
    fn test_config_validation() {
        let invalid_webhook = r#"
[notifications]
webhook_url = "not-a-url"
"#;
        let config = FlywheelConfig::from_toml_str(invalid_webhook).unwrap();
        assert!(config.validate().is_err());

        let inverted_drift = r#"
[retraining]
baseline_mape = 12.0
drift_mape = 10.0
"#;
        let config = FlywheelConfig::from_toml_str(inverted_drift).unwrap();
        assert!(config.validate().is_err());

        let bad_ratio = r#"
[retraining]
low_confidence_ratio = 1.5
"#;
        let config = FlywheelConfig::from_toml_str(bad_ratio).unwrap();
        assert!(config.validate().is_err());

        let escaping_prefix = r#"
[data_lake]
prefix = "prod/../shared"
"#;
        let config = FlywheelConfig::from_toml_str(escaping_prefix).unwrap();
        assert!(matches!(
            config.validate(),
            Err(FlywheelError::InvalidConfigValueError { field, .. }) if field == "data_lake.prefix"
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[data_lake]
local_path = "/tmp/flywheel-lake"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = FlywheelConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.data_lake.local_path, "/tmp/flywheel-lake");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = FlywheelConfig::from_toml_str("[data_lake\nbucket = 1").unwrap_err();
        assert!(matches!(err, FlywheelError::ConfigValidationError { .. }));
    }
}
