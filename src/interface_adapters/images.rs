use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::errors::StorageError;
use crate::domain::ports::ImageStore;

// Filesystem image store keyed by the SHA-256 of the uploaded bytes, so
// re-uploading the same image reuses the existing file.
#[derive(Clone)]
pub struct FsImageStore {
    pub directory: PathBuf,
}

impl FsImageStore {
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        // Names are hex digests; anything else could escape the directory.
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.directory.join(name))
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save(&self, bytes: Vec<u8>) -> Result<String, StorageError> {
        let name = format!("{:x}", Sha256::digest(&bytes));
        let path = self.directory.join(&name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(name);
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| StorageError::Backend(err.to_string()))?;
        tracing::debug!(image = %name, "stored map image");

        Ok(name)
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let Some(path) = self.path_for(name) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn when_image_is_saved_then_it_loads_under_returned_name() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let store = FsImageStore {
            directory: dir.path().join("maps"),
        };

        let name = store
            .save(b"fake-png".to_vec())
            .await
            .expect("expected save to succeed");
        let again = store
            .save(b"fake-png".to_vec())
            .await
            .expect("expected second save to succeed");

        assert_eq!(name, again);
        assert_eq!(name.len(), 64);
        let loaded = store.load(&name).await.expect("expected load to succeed");
        assert_eq!(loaded.as_deref(), Some(&b"fake-png"[..]));
    }

    #[tokio::test]
    async fn when_name_is_not_a_digest_then_load_returns_none() {
        let dir = tempfile::tempdir().expect("expected temp dir");
        let store = FsImageStore {
            directory: dir.path().to_path_buf(),
        };

        let loaded = store
            .load("../secret")
            .await
            .expect("expected load to succeed");

        assert!(loaded.is_none());
    }
}
