use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use confluence_publisher::db;
use confluence_publisher::model::{AttemptStatus, ScheduleStatus};
use confluence_publisher::provider::stub::STUB_ID_PREFIX;
use confluence_publisher::provider::{ProviderResult, PublishProvider, StubProvider};
use confluence_publisher::scheduler;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

async fn insert_test_page(pool: &sqlx::SqlitePool) -> i64 {
    db::insert_page(pool, "Weekly Report", "<p>report</p>", "DEV", None, &[])
        .await
        .unwrap()
}

/// Provider whose every call fails with a connection error.
struct FailingProvider;

#[async_trait]
impl PublishProvider for FailingProvider {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn publish_page(
        &self,
        _space_key: &str,
        _title: &str,
        _content: &str,
        _parent_page_id: Option<&str>,
        _attachment_paths: &[String],
    ) -> Result<ProviderResult> {
        Err(anyhow!("connection refused"))
    }

    async fn get_status(&self, _page_id: &str) -> String {
        "error".into()
    }
}

#[tokio::test]
async fn due_schedule_is_posted_via_stub() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;
    let schedule = db::create_schedule(&pool, page_id, Some(Utc::now() - Duration::seconds(1)))
        .await
        .unwrap();
    assert_eq!(schedule.status, ScheduleStatus::Queued);
    assert_eq!(schedule.attempt_count, 0);

    let processed = scheduler::process_due_schedules(&pool, &StubProvider, Utc::now())
        .await
        .unwrap();
    assert_eq!(processed, 1);

    let entry = db::get_schedule(&pool, schedule.id).await.unwrap();
    assert_eq!(entry.status, ScheduleStatus::Posted);
    assert_eq!(entry.attempt_count, 1);
    assert!(entry.last_error.is_none());

    let logs = db::list_publish_logs(&pool, page_id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AttemptStatus::Success);
    let remote_id = logs[0].confluence_page_id.as_deref().unwrap();
    assert!(remote_id.starts_with(STUB_ID_PREFIX));
    assert!(remote_id[STUB_ID_PREFIX.len()..]
        .chars()
        .all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn backend_failure_marks_schedule_failed() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;
    let schedule = db::create_schedule(&pool, page_id, Some(Utc::now() - Duration::seconds(1)))
        .await
        .unwrap();

    scheduler::process_due_schedules(&pool, &FailingProvider, Utc::now())
        .await
        .unwrap();

    let entry = db::get_schedule(&pool, schedule.id).await.unwrap();
    assert_eq!(entry.status, ScheduleStatus::Failed);
    assert_eq!(entry.attempt_count, 1);
    assert!(entry.last_error.as_deref().unwrap().contains("connection refused"));

    let logs = db::list_publish_logs(&pool, page_id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AttemptStatus::Error);
}

#[tokio::test]
async fn terminal_schedules_are_never_repicked() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;
    let schedule = db::create_schedule(&pool, page_id, Some(Utc::now() - Duration::seconds(1)))
        .await
        .unwrap();

    scheduler::process_due_schedules(&pool, &StubProvider, Utc::now())
        .await
        .unwrap();
    let processed = scheduler::process_due_schedules(&pool, &StubProvider, Utc::now())
        .await
        .unwrap();
    assert_eq!(processed, 0);

    let entry = db::get_schedule(&pool, schedule.id).await.unwrap();
    assert_eq!(entry.attempt_count, 1);
    let logs = db::list_publish_logs(&pool, page_id, 10).await.unwrap();
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn future_schedule_is_left_alone() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;
    let schedule = db::create_schedule(&pool, page_id, Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();

    let processed = scheduler::process_due_schedules(&pool, &StubProvider, Utc::now())
        .await
        .unwrap();
    assert_eq!(processed, 0);

    let entry = db::get_schedule(&pool, schedule.id).await.unwrap();
    assert_eq!(entry.status, ScheduleStatus::Queued);
    assert_eq!(entry.attempt_count, 0);
}

#[tokio::test]
async fn one_bad_entry_does_not_block_the_batch() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;

    // First schedule points at a page that does not exist.
    let bad = db::create_schedule(&pool, 9999, Some(Utc::now() - Duration::seconds(2)))
        .await
        .unwrap();
    let good = db::create_schedule(&pool, page_id, Some(Utc::now() - Duration::seconds(1)))
        .await
        .unwrap();

    let processed = scheduler::process_due_schedules(&pool, &StubProvider, Utc::now())
        .await
        .unwrap();
    assert_eq!(processed, 2);

    let bad = db::get_schedule(&pool, bad.id).await.unwrap();
    assert_eq!(bad.status, ScheduleStatus::Failed);
    assert_eq!(bad.attempt_count, 1);
    assert!(bad
        .last_error
        .as_deref()
        .unwrap()
        .to_lowercase()
        .contains("not found"));

    let good = db::get_schedule(&pool, good.id).await.unwrap();
    assert_eq!(good.status, ScheduleStatus::Posted);
    assert!(good.last_error.is_none());
}

#[tokio::test]
async fn batch_uses_one_as_of_instant() {
    let pool = setup_pool().await;
    let page_id = insert_test_page(&pool).await;
    let now = Utc::now();

    db::create_schedule(&pool, page_id, Some(now - Duration::seconds(5)))
        .await
        .unwrap();
    let later = db::create_schedule(&pool, page_id, Some(now + Duration::seconds(30)))
        .await
        .unwrap();

    // The tick's captured instant decides dueness for the whole batch.
    let processed = scheduler::process_due_schedules(&pool, &StubProvider, now)
        .await
        .unwrap();
    assert_eq!(processed, 1);
    let later = db::get_schedule(&pool, later.id).await.unwrap();
    assert_eq!(later.status, ScheduleStatus::Queued);
}
