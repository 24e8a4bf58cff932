//! In-process map backend, for development runs and as the mock store in
//! lifecycle tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::storage::{ObjectStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(self.url_for(key))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        let data = objects.get(src_key).cloned().ok_or_else(|| StoreError::Permanent {
            op: "copy",
            message: format!("no such key: {src_key}"),
        })?;
        objects.insert(dst_key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("memory://imagehub/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_duplicates_bytes_under_the_new_key() {
        let store = MemoryStore::new();
        store.put("a", b"data").await.unwrap();
        store.copy("a", "b").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(!store.contains("a").await);
        assert!(store.contains("b").await);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.put("a", b"data").await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.keys().await.is_empty());
    }
}
