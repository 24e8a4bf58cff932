//! Flat-directory backend. Objects are plain files under a configured
//! root; their URLs point at the `/uploads` static route the HTTP layer
//! serves for this driver.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::storage::{ObjectStore, StoreError};

pub struct FilesystemStore {
    root: PathBuf,
    public_base: String,
}

impl FilesystemStore {
    pub fn new<P: AsRef<Path>>(root: P, public_base: &str) -> Self {
        FilesystemStore {
            root: root.as_ref().to_path_buf(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn classify(op: &'static str, err: std::io::Error) -> StoreError {
    let message = err.to_string();
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
            StoreError::Transient { op, message }
        }
        _ => StoreError::Permanent { op, message },
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<String, StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| classify("put", e))?;
        fs::write(self.path_for(key), data)
            .await
            .map_err(|e| classify("put", e))?;
        Ok(self.url_for(key))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        fs::copy(self.path_for(src_key), self.path_for(dst_key))
            .await
            .map(|_| ())
            .map_err(|e| classify("copy", e))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(classify("delete", e)),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/uploads/{}", self.public_base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_copy_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path(), "http://localhost:5000/");

        let url = store.put("a.jpg", b"bytes").await.unwrap();
        assert_eq!(url, "http://localhost:5000/uploads/a.jpg");

        store.copy("a.jpg", "b.jpg").await.unwrap();
        store.delete("a.jpg").await.unwrap();

        assert!(!dir.path().join("a.jpg").exists());
        assert_eq!(fs::read(dir.path().join("b.jpg")).await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn delete_of_missing_key_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path(), "http://localhost:5000");
        store.delete("nothing-here.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn copy_of_missing_key_is_a_permanent_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path(), "http://localhost:5000");
        let err = store.copy("missing.jpg", "dst.jpg").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
