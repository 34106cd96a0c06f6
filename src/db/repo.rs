use super::model::StoredImage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let opts = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url: {}", database_url))?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(opts).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn tags_for(pool: &Pool, image_id: i64) -> Result<Vec<String>> {
    let tags = sqlx::query_scalar::<_, String>(
        "SELECT t.name FROM tags t JOIN image_tags it ON it.tag_id = t.id WHERE it.image_id = ? ORDER BY t.name",
    )
    .bind(image_id)
    .fetch_all(pool)
    .await?;
    Ok(tags)
}

fn row_to_image(row: &sqlx::sqlite::SqliteRow, tags: Vec<String>) -> Result<StoredImage> {
    Ok(StoredImage {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        file_name: row.try_get("file_name")?,
        byte_len: row.try_get("byte_len")?,
        tags,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[instrument(skip_all)]
pub async fn find_image_by_title(pool: &Pool, title: &str) -> Result<Option<StoredImage>> {
    let row = sqlx::query(
        "SELECT id, title, file_name, byte_len, created_at FROM images WHERE title = ?",
    )
    .bind(title)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let id: i64 = row.try_get("id")?;
    let tags = tags_for(pool, id).await?;
    Ok(Some(row_to_image(&row, tags)?))
}

/// Insert an image and attach `tags`, creating missing tags.
#[instrument(skip_all)]
pub async fn insert_image(
    pool: &Pool,
    title: &str,
    file_name: &str,
    content: &[u8],
    tags: &[String],
) -> Result<StoredImage> {
    let mut tx = pool.begin().await?;
    let id: i64 = sqlx::query(
        "INSERT INTO images (title, file_name, byte_len, content, created_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(file_name)
    .bind(content.len() as i64)
    .bind(content)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    for tag in tags {
        sqlx::query("INSERT INTO tags (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(tag)
            .execute(&mut *tx)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(tag)
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?, ?)")
            .bind(id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    find_image_by_title(pool, title)
        .await?
        .context("inserted image vanished")
}

/// All images, optionally restricted to those carrying `tag`, ordered by id.
#[instrument(skip_all)]
pub async fn list_images(pool: &Pool, tag: Option<&str>) -> Result<Vec<StoredImage>> {
    let rows = match tag {
        Some(tag) => {
            sqlx::query(
                "SELECT i.id, i.title, i.file_name, i.byte_len, i.created_at FROM images i \
                 JOIN image_tags it ON it.image_id = i.id JOIN tags t ON t.id = it.tag_id \
                 WHERE t.name = ? ORDER BY i.id",
            )
            .bind(tag)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT id, title, file_name, byte_len, created_at FROM images ORDER BY id",
            )
            .fetch_all(pool)
            .await?
        }
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let tags = tags_for(pool, id).await?;
        out.push(row_to_image(row, tags)?);
    }
    Ok(out)
}

pub async fn count_images(pool: &Pool) -> Result<i64> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Raw bytes of an image, for verification.
pub async fn image_content(pool: &Pool, id: i64) -> Result<Option<Vec<u8>>> {
    let content = sqlx::query_scalar::<_, Vec<u8>>("SELECT content FROM images WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[test]
    fn prepare_url_passes_memory_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
    }

    #[test]
    fn prepare_url_creates_parent_dir() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("nested").join("images.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());
        let rebuilt = prepare_sqlite_url(&url);
        assert_eq!(rebuilt, url);
        assert!(td.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn insert_then_find_with_tags() {
        let pool = setup_pool().await;
        let tags = vec!["support-logos".to_string(), "imported".to_string()];
        let img = insert_image(&pool, "logo.png", "logo.png", b"\x89PNG", &tags)
            .await
            .unwrap();
        assert_eq!(img.title, "logo.png");
        assert_eq!(img.byte_len, 4);
        assert_eq!(img.tags, vec!["imported", "support-logos"]);

        let found = find_image_by_title(&pool, "logo.png").await.unwrap().unwrap();
        assert_eq!(found.id, img.id);
        assert_eq!(image_content(&pool, img.id).await.unwrap().unwrap(), b"\x89PNG");
        assert!(find_image_by_title(&pool, "other.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_title_is_rejected() {
        let pool = setup_pool().await;
        insert_image(&pool, "a.png", "a.png", b"1", &[]).await.unwrap();
        assert!(insert_image(&pool, "a.png", "a.png", b"2", &[]).await.is_err());
        assert_eq!(count_images(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_tag() {
        let pool = setup_pool().await;
        insert_image(&pool, "a.png", "a.png", b"1", &["support-logos".to_string()])
            .await
            .unwrap();
        insert_image(&pool, "b.png", "b.png", b"2", &["support-banners".to_string()])
            .await
            .unwrap();
        assert_eq!(list_images(&pool, None).await.unwrap().len(), 2);
        let logos = list_images(&pool, Some("support-logos")).await.unwrap();
        assert_eq!(logos.len(), 1);
        assert_eq!(logos[0].title, "a.png");
    }
}
