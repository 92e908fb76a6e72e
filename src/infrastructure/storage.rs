// Image storage - external object store collaborator
// Uploaded objects get a unique generated name; removal is best-effort.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// An image received from a multipart form, not yet stored.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }

    /// Reject empty files and unsupported formats before touching storage.
    pub fn check(&self) -> AppResult<()> {
        if self.bytes.is_empty() {
            return Err(AppError::Validation("Image file is empty".to_string()));
        }
        match self.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(AppError::Validation(format!(
                "Image must be one of: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))),
        }
    }

    /// Unique object name that keeps the original extension.
    pub fn unique_name(&self) -> String {
        match self.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        }
    }
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image and return its public URL.
    async fn upload(&self, image: &ImageUpload) -> AppResult<String>;

    /// Release a previously stored object.
    async fn remove(&self, url: &str) -> AppResult<()>;
}

/// Release stored objects after their owning rows are gone; failures are only logged.
pub async fn release_all(store: &dyn ImageStore, urls: Vec<String>) {
    let removals = urls.iter().map(|url| async move {
        if let Err(e) = store.remove(url).await {
            warn!(url = %url, "Failed to release stored image: {}", e);
        }
    });
    futures::future::join_all(removals).await;
}

/// Filesystem-backed store served over HTTP under `public_url`.
pub struct LocalImageStore {
    root: PathBuf,
    public_url: String,
}

impl LocalImageStore {
    pub async fn new(root: impl Into<PathBuf>, public_url: &str) -> AppResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| AppError::Storage {
            message: format!("Failed to create upload directory {}: {}", root.display(), e),
            committed: false,
        })?;
        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a public URL back to a file in the store, refusing anything outside it.
    fn object_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(&self.public_url)?.trim_start_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    #[instrument(skip(self, image), fields(file = %image.file_name, size = image.bytes.len()))]
    async fn upload(&self, image: &ImageUpload) -> AppResult<String> {
        image.check()?;
        let name = image.unique_name();
        tokio::fs::write(self.root.join(&name), &image.bytes)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to write {}: {}", name, e),
                committed: false,
            })?;
        info!(object = %name, "Image stored");
        Ok(format!("{}/{}", self.public_url, name))
    }

    async fn remove(&self, url: &str) -> AppResult<()> {
        let Some(path) = self.object_path(url) else {
            // Not one of ours (e.g. an external profile picture); nothing to release.
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage {
                message: format!("Failed to remove {}: {}", path.display(), e),
                committed: true,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn check_rejects_unknown_extensions_and_empty_files() {
        assert!(upload("a.png", b"x").check().is_ok());
        assert!(upload("a.JPG", b"x").check().is_ok());
        assert!(upload("a.exe", b"x").check().is_err());
        assert!(upload("noext", b"x").check().is_err());
        assert!(upload("a.png", b"").check().is_err());
    }

    #[test]
    fn unique_names_keep_extension() {
        let image = upload("photo.jpeg", b"x");
        let a = image.unique_name();
        let b = image.unique_name();
        assert!(a.ends_with(".jpeg"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn upload_then_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads/").await.unwrap();

        let url = store.upload(&upload("a.png", b"png-bytes")).await.unwrap();
        assert!(url.starts_with("/uploads/"));
        let path = store.object_path(&url).unwrap();
        assert!(path.exists());

        store.remove(&url).await.unwrap();
        assert!(!path.exists());
        // second removal is a no-op
        store.remove(&url).await.unwrap();
    }

    #[tokio::test]
    async fn foreign_urls_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), "/uploads").await.unwrap();
        assert!(store.object_path("https://cdn.example.com/a.png").is_none());
        assert!(store.object_path("/uploads/../secret").is_none());
        store.remove("https://cdn.example.com/a.png").await.unwrap();
    }
}
