use crate::config::StorageConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create image directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Transient storage for uploads and annotated outputs. Paths are namespaced
/// by a per-request id, so identical client filenames never collide.
pub struct ImageStore {
    image_dir: PathBuf,
}

impl ImageStore {
    pub fn new(storage_config: &StorageConfig) -> Result<Self, StoreError> {
        let image_dir = storage_config.image_dir.clone();
        std::fs::create_dir_all(&image_dir).map_err(|source| StoreError::CreateDir {
            path: image_dir.display().to_string(),
            source,
        })?;
        Ok(Self { image_dir })
    }

    /// Strips any directory components from a client-supplied filename.
    fn sanitize(filename: &str) -> &str {
        Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
    }

    pub fn upload_path(&self, request_id: &str, filename: &str) -> PathBuf {
        self.image_dir
            .join(format!("{}_{}", request_id, Self::sanitize(filename)))
    }

    pub fn annotated_path(&self, request_id: &str, filename: &str) -> PathBuf {
        self.image_dir.join(format!(
            "detection_{}_{}",
            request_id,
            Self::sanitize(filename)
        ))
    }

    pub async fn save_upload(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    pub async fn remove_upload(&self, path: &Path) -> Result<(), StoreError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| StoreError::Remove {
                path: path.display().to_string(),
                source,
            })
    }
}
