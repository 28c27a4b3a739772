//! Storage for uploaded images. Records only keep the returned relative path.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use thebook_kernel::settings::MediaSettings;
use uuid::{Timestamp, Uuid};

use super::form_data::Upload;

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist the upload and return its path relative to the media root.
    async fn save(&self, upload: &Upload) -> anyhow::Result<String>;

    /// Public URL for a stored path.
    fn url(&self, path: &str) -> String;
}

/// Writes uploads below `<root>/<upload_dir>/` under fresh UUIDv7 names.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    url_prefix: String,
    upload_dir: String,
}

impl LocalMediaStorage {
    pub fn new(
        root: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        upload_dir: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
            upload_dir: upload_dir.into(),
        }
    }

    pub fn from_settings(settings: &MediaSettings) -> Self {
        Self::new(&settings.root, &settings.url_prefix, &settings.upload_dir)
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save(&self, upload: &Upload) -> anyhow::Result<String> {
        let id = Uuid::new_v7(Timestamp::now(uuid::NoContext));
        let file_name = match upload.extension() {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        };

        let dir = self.root.join(&self.upload_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create media directory {}", dir.display()))?;

        let path = dir.join(&file_name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("failed to write upload to {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            bytes = upload.bytes.len(),
            original = %upload.file_name,
            "stored upload"
        );
        Ok(format!("{}/{}", self.upload_dir, file_name))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "/{}/{}",
            self.url_prefix.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_under_upload_dir() {
        let root = std::env::temp_dir().join(format!("thebook-media-{}", Uuid::new_v4()));
        let storage = LocalMediaStorage::new(&root, "/media/", "posts");

        let stored = storage
            .save(&Upload::new("cover.PNG", Some("image/png"), b"png".to_vec()))
            .await
            .unwrap();

        assert!(stored.starts_with("posts/"));
        assert!(stored.ends_with(".png"));
        let written = std::fs::read(root.join(&stored)).unwrap();
        assert_eq!(written, b"png");
        assert_eq!(storage.url(&stored), format!("/media/{}", stored));

        std::fs::remove_dir_all(&root).ok();
    }
}
