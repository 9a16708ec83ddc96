//! Media stored on the local filesystem and served by the API itself

use super::{ImageTransform, MediaError, MediaStorage, UploadedImage};
use crate::core::models::Photo;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Writes images below `root`; a public id `a/b/<uuid>` lives at `root/a/b/<uuid>.<ext>`
/// and is reachable at `<public_base_url>/a/b/<uuid>.<ext>`.
///
/// Images are stored as uploaded; transforms are a hosted-backend feature.
pub struct LocalMediaStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: PathBuf, public_base_url: String) -> Result<Self, MediaError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject ids that would escape the storage root
    fn checked_relative(public_id: &str) -> Result<&Path, MediaError> {
        let path = Path::new(public_id);
        let safe = !public_id.is_empty()
            && !public_id.contains('\\')
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if safe {
            Ok(path)
        } else {
            Err(MediaError::InvalidPublicId(public_id.to_string()))
        }
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn upload(
        &self,
        folder: &str,
        image: &UploadedImage,
        _transform: ImageTransform,
    ) -> Result<Photo, MediaError> {
        let public_id = format!("{}/{}", folder.trim_matches('/'), Uuid::new_v4());
        let relative = Self::checked_relative(&public_id)?;
        let ext = image.extension().unwrap_or_else(|| "img".to_string());
        let file_name = format!("{}.{}", public_id, ext);

        let full_path = self.root.join(relative).with_extension(&ext);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, &image.bytes).await?;
        debug!("Stored {} bytes at {}", image.bytes.len(), full_path.display());

        Ok(Photo {
            url: format!("{}/{}", self.public_base_url, file_name),
            public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let relative = Self::checked_relative(public_id)?;
        let target = self.root.join(relative);
        let (Some(dir), Some(stem)) = (target.parent(), target.file_name()) else {
            return Ok(());
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem() == Some(stem) {
                tokio::fs::remove_file(&path).await?;
                debug!("Deleted {}", path.display());
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
