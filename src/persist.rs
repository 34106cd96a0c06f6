use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::model::{AssetRef, Category, VideoRef};
use crate::store::ImageStore;

pub const IMPORTED_TAG: &str = "imported";
pub const VIDEO_MANIFEST: &str = "videos.json";

/// Writes downloaded bytes under `<output_dir>/<category>/` and registers them
/// with the image store, when one is available.
pub struct Persister {
    output_dir: PathBuf,
    store: Option<Arc<dyn ImageStore>>,
}

impl Persister {
    pub fn new(output_dir: impl Into<PathBuf>, store: Option<Arc<dyn ImageStore>>) -> Self {
        Self {
            output_dir: output_dir.into(),
            store,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Create one subdirectory per image category.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for category in Category::IMAGE_DIRS {
            let dir = self.output_dir.join(category.as_str());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Write the file (always), then register it unless a record with the
    /// same title exists. A store failure downgrades to a file-only reference.
    #[instrument(skip_all, fields(filename = %filename, category = %category))]
    pub async fn persist(
        &self,
        content: &[u8],
        filename: &str,
        category: Category,
        url: &str,
    ) -> Result<AssetRef> {
        let dir = self.output_dir.join(category.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(filename);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        let store_id = match &self.store {
            Some(store) => match self.register(store.as_ref(), content, filename, category).await {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(?err, "failed to register image; kept file only");
                    None
                }
            },
            None => None,
        };

        Ok(AssetRef {
            filename: filename.to_string(),
            category,
            url: url.to_string(),
            path,
            store_id,
        })
    }

    async fn register(
        &self,
        store: &dyn ImageStore,
        content: &[u8],
        filename: &str,
        category: Category,
    ) -> Result<i64> {
        if let Some(existing) = store.find_by_title(filename).await? {
            info!(id = existing.id, "image already exists");
            return Ok(existing.id);
        }
        let tags = vec![category.store_tag(), IMPORTED_TAG.to_string()];
        let created = store.create(filename, content, &tags).await?;
        info!(id = created.id, "uploaded image");
        Ok(created.id)
    }

    /// Write `videos.json` (pretty-printed `[{id, title}]`). Skipped when empty.
    pub async fn write_video_manifest(&self, videos: &[VideoRef]) -> Result<Option<PathBuf>> {
        if videos.is_empty() {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;
        let path = self.output_dir.join(VIDEO_MANIFEST);
        let json = serde_json::to_string_pretty(videos).context("failed to encode videos")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), count = videos.len(), "saved video metadata");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteImageStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_only_when_no_store() {
        let td = tempdir().unwrap();
        let p = Persister::new(td.path(), None);
        let r = p
            .persist(b"img", "logo.png", Category::Logos, "https://cdn/logo.png")
            .await
            .unwrap();
        assert_eq!(r.store_id, None);
        assert_eq!(r.path, td.path().join("logos").join("logo.png"));
        assert_eq!(std::fs::read(&r.path).unwrap(), b"img");
    }

    #[tokio::test]
    async fn second_upload_reuses_record_but_rewrites_file() {
        let td = tempdir().unwrap();
        let store = SqliteImageStore::open("sqlite::memory:").await.unwrap();
        let pool = store.pool().clone();
        let p = Persister::new(td.path(), Some(Arc::new(store)));

        let first = p
            .persist(b"v1", "card.png", Category::PostCards, "u")
            .await
            .unwrap();
        std::fs::remove_file(&first.path).unwrap();
        let second = p
            .persist(b"v2", "card.png", Category::PostCards, "u")
            .await
            .unwrap();

        assert!(first.store_id.is_some());
        assert_eq!(first.store_id, second.store_id);
        assert_eq!(crate::db::count_images(&pool).await.unwrap(), 1);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"v2");

        let rec = crate::db::find_image_by_title(&pool, "card.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.tags, vec!["imported", "support-post-cards"]);
    }

    #[tokio::test]
    async fn manifest_written_pretty_and_skipped_when_empty() {
        let td = tempdir().unwrap();
        let p = Persister::new(td.path().join("out"), None);
        assert!(p.write_video_manifest(&[]).await.unwrap().is_none());
        assert!(!td.path().join("out").exists());

        let path = p
            .write_video_manifest(&[VideoRef::discovered("42")])
            .await
            .unwrap()
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("\n  {"));
        let parsed: Vec<VideoRef> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![VideoRef::discovered("42")]);
    }

    #[tokio::test]
    async fn ensure_dirs_creates_category_tree() {
        let td = tempdir().unwrap();
        let p = Persister::new(td.path(), None);
        p.ensure_dirs().await.unwrap();
        for c in ["logos", "banners", "fact-cards", "post-cards", "general"] {
            assert!(td.path().join(c).is_dir());
        }
        assert!(!td.path().join("videos").exists());
    }
}
