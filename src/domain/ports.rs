use crate::domain::model::{FlywheelEvent, ObjectMetadata};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Object storage behind the data lake (local directory, S3, or memory).
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        metadata: &ObjectMetadata,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Keys under `prefix`, sorted.
    fn list(&self, prefix: &str) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &FlywheelEvent) -> Result<()>;
}
