//! Publish orchestrator: loads a page, dispatches it to the selected
//! provider and records the outcome as an append-only publish log entry.

use crate::db::{self, Pool};
use crate::model::{AttemptStatus, PublishLog};
use crate::provider::PublishProvider;
use anyhow::Result;
use tracing::{info, instrument, warn};

/// Publish one page and record the attempt.
///
/// Page-missing and backend failures are converted into an error log entry
/// rather than propagated, so this is safe to call unconditionally from the
/// poll loop. The only `Err` left is a failure of the log sink itself.
#[instrument(skip(pool, provider))]
pub async fn publish_page(
    pool: &Pool,
    provider: &dyn PublishProvider,
    page_id: i64,
) -> Result<PublishLog> {
    match try_publish(pool, provider, page_id).await {
        Ok(log) => Ok(log),
        Err(err) => {
            warn!(?err, page_id, "publish failed");
            db::append_publish_log(
                pool,
                page_id,
                "unknown",
                None,
                None,
                AttemptStatus::Error,
                &format!("Failed to publish: {err:#}"),
            )
            .await
        }
    }
}

async fn try_publish(
    pool: &Pool,
    provider: &dyn PublishProvider,
    page_id: i64,
) -> Result<PublishLog> {
    let page = db::fetch_page_for_publish(pool, page_id).await?;

    // Unresolvable attachment refs are dropped, not fatal.
    let mut attachment_paths = Vec::with_capacity(page.attachments.len());
    for reference in &page.attachments {
        match &reference.storage_path {
            Some(path) => attachment_paths.push(path.clone()),
            None => warn!(
                attachment_id = reference.attachment_id,
                page_id, "attachment cannot be resolved, dropping"
            ),
        }
    }

    let result = provider
        .publish_page(
            &page.space_key,
            &page.title,
            &page.content,
            page.parent_page_id.as_deref(),
            &attachment_paths,
        )
        .await?;

    info!(page_id, remote_id = %result.page_id, "page published");
    db::append_publish_log(
        pool,
        page_id,
        provider.name(),
        Some(&page.space_key),
        Some(&result.page_id),
        AttemptStatus::Success,
        &result.message,
    )
    .await
}
