use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::db::{self, Pool, StoredImage};

/// The external image library the importer registers assets with.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn find_by_title(&self, title: &str) -> Result<Option<StoredImage>>;

    async fn create(&self, title: &str, content: &[u8], tags: &[String]) -> Result<StoredImage>;
}

#[derive(Debug, Clone)]
pub struct SqliteImageStore {
    pool: Pool,
}

impl SqliteImageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect and migrate.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = db::init_pool(database_url)
            .await
            .with_context(|| format!("failed to open image store at {}", database_url))?;
        db::run_migrations(&pool)
            .await
            .context("failed to migrate image store")?;
        Ok(Self { pool })
    }

    /// Open the store, or log once and return `None` so the run degrades to
    /// file-only persistence.
    pub async fn open_or_disable(database_url: &str) -> Option<Self> {
        if database_url.trim().is_empty() {
            info!("no image store configured; persisting files only");
            return None;
        }
        match Self::open(database_url).await {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(?err, "image store unavailable; persisting files only");
                None
            }
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl ImageStore for SqliteImageStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<StoredImage>> {
        db::find_image_by_title(&self.pool, title).await
    }

    async fn create(&self, title: &str, content: &[u8], tags: &[String]) -> Result<StoredImage> {
        db::insert_image(&self.pool, title, title, content, tags).await
    }
}
