use crate::domain::model::ObjectMetadata;
use crate::domain::ports::Storage;
use crate::utils::error::{FlywheelError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub metadata: ObjectMetadata,
}

/// In-process storage. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

impl Storage for MemoryStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock().await;
        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| FlywheelError::StorageError {
                message: format!("Object not found: {}", path),
            })
    }

    async fn write_file(&self, path: &str, data: &[u8], metadata: &ObjectMetadata) -> Result<()> {
        let mut objects = self.objects.lock().await;
        objects.insert(
            path.to_string(),
            StoredObject {
                data: data.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock().await;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
