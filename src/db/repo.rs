use super::model::{AttachmentRef, PageForPublish};
use crate::model::{AttemptStatus, Page, PublishLog, Schedule, ScheduleStatus};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For a file-backed SQLite URL, ensure the parent directory exists so the
/// first connect can create the database file. In-memory URLs and non-sqlite
/// schemes pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let path_part = rest.split('?').next().unwrap_or("");
    if path_part.is_empty() {
        return url.to_string();
    }

    if let Some(parent) = std::path::Path::new(path_part).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    url.to_string()
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn insert_page(
    pool: &Pool,
    title: &str,
    content: &str,
    space_key: &str,
    parent_page_id: Option<&str>,
    attachment_ids: &[i64],
) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let page_id: i64 = sqlx::query(
        "INSERT INTO pages (title, content, space_key, parent_page_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(title)
    .bind(content)
    .bind(space_key)
    .bind(parent_page_id)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    for (position, attachment_id) in attachment_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO page_attachments (page_id, attachment_id, position) VALUES (?, ?, ?)",
        )
        .bind(page_id)
        .bind(attachment_id)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(page_id)
}

#[instrument(skip_all)]
pub async fn get_page(pool: &Pool, page_id: i64) -> Result<Page> {
    let row = sqlx::query(
        "SELECT id, title, content, space_key, parent_page_id, created_at FROM pages WHERE id = ?",
    )
    .bind(page_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(anyhow!("page {} not found", page_id));
    };

    Ok(Page {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        space_key: row.get("space_key"),
        parent_page_id: row.try_get::<Option<String>, _>("parent_page_id").ok().flatten(),
        created_at: row.get("created_at"),
    })
}

/// Load the slice of a page the orchestrator needs for one publish attempt:
/// page fields plus its attachment references in stored order. References
/// whose attachment row has been deleted come back with `storage_path: None`.
#[instrument(skip_all)]
pub async fn fetch_page_for_publish(pool: &Pool, page_id: i64) -> Result<PageForPublish> {
    let page = get_page(pool, page_id).await?;

    let rows = sqlx::query(
        "SELECT pa.attachment_id, a.storage_path \
         FROM page_attachments pa \
         LEFT JOIN attachments a ON a.id = pa.attachment_id \
         WHERE pa.page_id = ? \
         ORDER BY pa.position ASC",
    )
    .bind(page_id)
    .fetch_all(pool)
    .await?;

    let attachments = rows
        .into_iter()
        .map(|row| AttachmentRef {
            attachment_id: row.get("attachment_id"),
            storage_path: row.try_get::<Option<String>, _>("storage_path").ok().flatten(),
        })
        .collect();

    Ok(PageForPublish {
        id: page.id,
        title: page.title,
        content: page.content,
        space_key: page.space_key,
        parent_page_id: page.parent_page_id,
        attachments,
    })
}

#[instrument(skip_all)]
pub async fn insert_attachment(
    pool: &Pool,
    filename: &str,
    content_type: Option<&str>,
    size: i64,
    storage_path: &str,
    description: Option<&str>,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO attachments (filename, content_type, size, storage_path, description) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(filename)
    .bind(content_type)
    .bind(size)
    .bind(storage_path)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn create_schedule(
    pool: &Pool,
    page_id: i64,
    scheduled_at: Option<DateTime<Utc>>,
) -> Result<Schedule> {
    // Omitted target instant means "publish on the next poll cycle".
    let scheduled_at = scheduled_at.unwrap_or_else(Utc::now);
    let id: i64 = sqlx::query(
        "INSERT INTO schedules (page_id, scheduled_at, status, attempt_count) VALUES (?, ?, 'queued', 0) RETURNING id",
    )
    .bind(page_id)
    .bind(scheduled_at)
    .fetch_one(pool)
    .await?
    .get("id");
    get_schedule(pool, id).await
}

#[instrument(skip_all)]
pub async fn get_schedule(pool: &Pool, schedule_id: i64) -> Result<Schedule> {
    let row = sqlx::query(
        "SELECT id, page_id, scheduled_at, status, attempt_count, last_error, created_at \
         FROM schedules WHERE id = ?",
    )
    .bind(schedule_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(anyhow!("schedule {} not found", schedule_id));
    };
    schedule_from_row(&row)
}

/// Most recent `limit` schedules. Ids are assigned monotonically, so id
/// ordering is a stable proxy for recency.
#[instrument(skip_all)]
pub async fn list_schedules(pool: &Pool, limit: i64) -> Result<Vec<Schedule>> {
    let rows = sqlx::query(
        "SELECT id, page_id, scheduled_at, status, attempt_count, last_error, created_at \
         FROM schedules ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(schedule_from_row).collect()
}

/// All queued schedules whose target instant has passed as of `now`,
/// oldest id first. Terminal rows are never returned regardless of time.
#[instrument(skip_all)]
pub async fn due_schedules(pool: &Pool, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
    let rows = sqlx::query(
        "SELECT id, page_id, scheduled_at, status, attempt_count, last_error, created_at \
         FROM schedules \
         WHERE status = 'queued' AND datetime(scheduled_at) <= datetime(?) \
         ORDER BY id ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    rows.iter().map(schedule_from_row).collect()
}

/// Record the outcome of one poll-cycle attempt: bump the attempt counter,
/// move the row to its terminal status and set or clear `last_error`.
#[instrument(skip_all)]
pub async fn mark_schedule_result(
    pool: &Pool,
    schedule_id: i64,
    status: ScheduleStatus,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE schedules SET status = ?, attempt_count = attempt_count + 1, last_error = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(error)
    .bind(schedule_id)
    .execute(pool)
    .await
    .context("failed to persist schedule transition")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn append_publish_log(
    pool: &Pool,
    page_id: i64,
    provider: &str,
    space_key: Option<&str>,
    confluence_page_id: Option<&str>,
    status: AttemptStatus,
    message: &str,
) -> Result<PublishLog> {
    let row = sqlx::query(
        "INSERT INTO publish_logs (page_id, provider, space_key, confluence_page_id, status, message) \
         VALUES (?, ?, ?, ?, ?, ?) \
         RETURNING id, page_id, provider, space_key, confluence_page_id, status, message, created_at",
    )
    .bind(page_id)
    .bind(provider)
    .bind(space_key)
    .bind(confluence_page_id)
    .bind(status.as_str())
    .bind(message)
    .fetch_one(pool)
    .await
    .context("failed to append publish log")?;
    publish_log_from_row(&row)
}

#[instrument(skip_all)]
pub async fn list_publish_logs(pool: &Pool, page_id: i64, limit: i64) -> Result<Vec<PublishLog>> {
    let rows = sqlx::query(
        "SELECT id, page_id, provider, space_key, confluence_page_id, status, message, created_at \
         FROM publish_logs WHERE page_id = ? ORDER BY id DESC LIMIT ?",
    )
    .bind(page_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(publish_log_from_row).collect()
}

fn schedule_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Schedule> {
    let status_str: String = row.get("status");
    let status = ScheduleStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("schedule has unknown status {}", status_str))?;
    Ok(Schedule {
        id: row.get("id"),
        page_id: row.get("page_id"),
        scheduled_at: row.get("scheduled_at"),
        status,
        attempt_count: row.get("attempt_count"),
        last_error: row.try_get::<Option<String>, _>("last_error").ok().flatten(),
        created_at: row.get("created_at"),
    })
}

fn publish_log_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PublishLog> {
    let status_str: String = row.get("status");
    let status = AttemptStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("publish log has unknown status {}", status_str))?;
    Ok(PublishLog {
        id: row.get("id"),
        page_id: row.get("page_id"),
        provider: row.get("provider"),
        space_key: row.try_get::<Option<String>, _>("space_key").ok().flatten(),
        confluence_page_id: row
            .try_get::<Option<String>, _>("confluence_page_id")
            .ok()
            .flatten(),
        status,
        message: row.get("message"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn page_roundtrip_with_ordered_attachments() {
        let pool = setup_pool().await;
        let a1 = insert_attachment(&pool, "one.png", Some("image/png"), 10, "/tmp/one.png", None)
            .await
            .unwrap();
        let a2 = insert_attachment(&pool, "two.pdf", None, 20, "/tmp/two.pdf", Some("manual"))
            .await
            .unwrap();

        let page_id = insert_page(&pool, "Title", "<p>body</p>", "DEV", None, &[a2, a1])
            .await
            .unwrap();

        let page = fetch_page_for_publish(&pool, page_id).await.unwrap();
        assert_eq!(page.title, "Title");
        // Insertion order, not attachment id order.
        let ids: Vec<i64> = page.attachments.iter().map(|a| a.attachment_id).collect();
        assert_eq!(ids, vec![a2, a1]);
        assert_eq!(
            page.attachments[0].storage_path.as_deref(),
            Some("/tmp/two.pdf")
        );
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let pool = setup_pool().await;
        let err = get_page(&pool, 9999).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("not found"));
    }

    #[tokio::test]
    async fn schedule_lifecycle() {
        let pool = setup_pool().await;
        let page_id = insert_page(&pool, "T", "c", "DEV", None, &[]).await.unwrap();

        let schedule = create_schedule(&pool, page_id, None).await.unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Queued);
        assert_eq!(schedule.attempt_count, 0);
        assert!(schedule.last_error.is_none());

        // Default scheduled_at is "now", so the entry is already due.
        let due = due_schedules(&pool, Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, schedule.id);

        mark_schedule_result(&pool, schedule.id, ScheduleStatus::Posted, None)
            .await
            .unwrap();
        let reloaded = get_schedule(&pool, schedule.id).await.unwrap();
        assert_eq!(reloaded.status, ScheduleStatus::Posted);
        assert_eq!(reloaded.attempt_count, 1);

        // Terminal rows are never due again.
        let due = due_schedules(&pool, Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn future_schedule_is_not_due() {
        let pool = setup_pool().await;
        let page_id = insert_page(&pool, "T", "c", "DEV", None, &[]).await.unwrap();
        let at = Utc::now() + Duration::hours(1);
        create_schedule(&pool, page_id, Some(at)).await.unwrap();

        let due = due_schedules(&pool, Utc::now()).await.unwrap();
        assert!(due.is_empty());

        let due = due_schedules(&pool, at + Duration::seconds(1)).await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn list_schedules_orders_by_id_desc() {
        let pool = setup_pool().await;
        let page_id = insert_page(&pool, "T", "c", "DEV", None, &[]).await.unwrap();
        let s1 = create_schedule(&pool, page_id, None).await.unwrap();
        let s2 = create_schedule(&pool, page_id, None).await.unwrap();
        let s3 = create_schedule(&pool, page_id, None).await.unwrap();

        let listed = list_schedules(&pool, 2).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![s3.id, s2.id]);
        assert!(s1.id < s2.id);
    }

    #[tokio::test]
    async fn publish_log_append_and_list() {
        let pool = setup_pool().await;
        let log = append_publish_log(
            &pool,
            42,
            "confluence-stub",
            Some("DEV"),
            Some("CONF-abc12345"),
            AttemptStatus::Success,
            "Successfully published",
        )
        .await
        .unwrap();
        assert_eq!(log.page_id, 42);
        assert_eq!(log.status, AttemptStatus::Success);

        append_publish_log(&pool, 42, "unknown", None, None, AttemptStatus::Error, "boom")
            .await
            .unwrap();

        let logs = list_publish_logs(&pool, 42, 10).await.unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first.
        assert_eq!(logs[0].status, AttemptStatus::Error);
    }

    #[test]
    fn prepare_sqlite_url_passthrough() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/db"),
            "postgres://localhost/db"
        );
    }
}
