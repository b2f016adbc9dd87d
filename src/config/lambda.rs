use crate::config::toml_config::FlywheelConfig;
use crate::domain::model::ObjectMetadata;
use crate::domain::ports::Storage;
use crate::utils::error::{FlywheelError, Result};
use crate::utils::validation::{
    validate_aws_region, validate_key_prefix, validate_s3_bucket_name, Validate,
};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;
use std::env;

#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    pub flywheel: FlywheelConfig,
}

impl LambdaConfig {
    /// S3_BUCKET is required; FLYWHEEL_CONFIG may point at a bundled TOML file.
    pub fn from_env() -> Result<Self> {
        let mut flywheel = match env::var("FLYWHEEL_CONFIG") {
            Ok(path) => FlywheelConfig::from_file(path)?,
            Err(_) => {
                let mut config = FlywheelConfig::default();
                config.apply_env_overrides();
                config
            }
        };

        let s3_bucket = env::var("S3_BUCKET").map_err(|_| FlywheelError::MissingConfigError {
            field: "S3_BUCKET".to_string(),
        })?;
        let s3_prefix = env::var("S3_PREFIX").unwrap_or_else(|_| flywheel.data_lake.prefix.clone());
        let s3_region = env::var("S3_REGION").unwrap_or_else(|_| flywheel.data_lake.region.clone());

        flywheel.data_lake.bucket = s3_bucket.clone();
        flywheel.data_lake.prefix = s3_prefix.clone();
        flywheel.data_lake.region = s3_region.clone();

        Ok(Self {
            s3_bucket,
            s3_prefix,
            s3_region,
            flywheel,
        })
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        // 驗證S3 bucket名稱
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;

        // 驗證區域
        validate_aws_region("s3_region", &self.s3_region)?;

        validate_key_prefix("s3_prefix", &self.s3_prefix)?;

        self.flywheel.validate()?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

/// Data lake on S3. Objects are encrypted at rest with AES256.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| FlywheelError::StorageError {
                message: format!("Failed to read s3://{}/{}: {}", self.bucket, path, e),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| FlywheelError::StorageError {
                message: format!("Failed to collect S3 data: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8], metadata: &ObjectMetadata) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data.to_vec()))
            .server_side_encryption(ServerSideEncryption::Aes256)
            .content_type(&metadata.content_type);

        if let Some(encoding) = &metadata.content_encoding {
            request = request.content_encoding(encoding);
        }
        for (key, value) in &metadata.tags {
            request = request.metadata(key, value);
        }

        request
            .send()
            .await
            .map_err(|e| FlywheelError::StorageError {
                message: format!(
                    "Failed to write s3://{}/{}: {}",
                    self.bucket,
                    path,
                    e.into_service_error()
                ),
            })?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| FlywheelError::StorageError {
                    message: format!("Failed to list s3://{}/{}: {}", self.bucket, prefix, e),
                })?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}
