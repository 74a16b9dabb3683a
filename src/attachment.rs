//! Local attachment storage: files are copied into the attachment directory
//! under a fresh uuid filename and recorded in the database. The publish
//! pipeline only ever reads the recorded `storage_path`.

use crate::db::{self, Pool};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Copy `source` into `attachment_dir` and record it. Returns the new
/// attachment id.
pub async fn store_file(
    pool: &Pool,
    attachment_dir: &str,
    source: &Path,
    description: Option<&str>,
) -> Result<i64> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid attachment file name: {}", source.display()))?
        .to_string();

    fs::create_dir_all(attachment_dir)
        .await
        .context("failed to create attachment directory")?;

    // Uuid-based stored name, original extension preserved.
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let stored_name = format!("{}{extension}", Uuid::new_v4());
    let storage_path = Path::new(attachment_dir).join(stored_name);

    let size = fs::copy(source, &storage_path)
        .await
        .with_context(|| format!("failed to store attachment: {}", source.display()))?;
    debug!(file = %storage_path.display(), size, "attachment stored");

    let id = db::insert_attachment(
        pool,
        &filename,
        Some(content_type_for(source)),
        size as i64,
        &storage_path.to_string_lossy(),
        description,
    )
    .await?;
    info!(id, filename, "attachment recorded");
    Ok(id)
}

/// Content type by file extension, `application/octet-stream` otherwise.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_ascii_lowercase())
    {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "txt" => "text/plain",
        Some(ext) if ext == "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;
    use tempfile::tempdir;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn store_file_copies_and_records() {
        let pool = setup_pool().await;
        let td = tempdir().unwrap();
        let source = td.path().join("diagram.png");
        tokio::fs::write(&source, b"fake png").await.unwrap();
        let dir = td.path().join("attachments");

        let id = store_file(&pool, &dir.to_string_lossy(), &source, Some("arch"))
            .await
            .unwrap();
        assert!(id > 0);

        let (filename, content_type, size, storage_path): (String, String, i64, String) =
            sqlx::query_as(
                "SELECT filename, content_type, size, storage_path FROM attachments WHERE id = ?",
            )
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(filename, "diagram.png");
        assert_eq!(content_type, "image/png");
        assert_eq!(size, 8);
        assert!(storage_path.ends_with(".png"));
        assert!(std::path::Path::new(&storage_path).exists());
    }

    #[tokio::test]
    async fn store_file_missing_source_fails() {
        let pool = setup_pool().await;
        let td = tempdir().unwrap();
        let err = store_file(
            &pool,
            &td.path().to_string_lossy(),
            Path::new("/nope/missing.bin"),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to store attachment"));
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("a")), "application/octet-stream");
    }
}
