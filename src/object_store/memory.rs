use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ObjectMeta, ObjectStore};

/// In-memory store backing tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().get(key).map(|(bytes, _)| bytes.clone()))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn head(&self, key: &str) -> anyhow::Result<Option<ObjectMeta>> {
        Ok(self.objects.lock().get(key).map(|(bytes, ct)| ObjectMeta {
            size: bytes.len() as u64,
            content_type: Some(ct.clone()),
        }))
    }
}
