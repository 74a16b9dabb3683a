//! Timer-driven poller for scheduled publishes.

use crate::db::{self, Pool};
use crate::model::{AttemptStatus, ScheduleStatus};
use crate::provider::PublishProvider;
use crate::publish;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument};

/// Run the poll loop forever. The tick body runs inline, so ticks never
/// overlap; a tick that outlasts the interval delays the next one.
pub async fn run(pool: Pool, provider: Arc<dyn PublishProvider>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = process_due_schedules(&pool, provider.as_ref(), Utc::now()).await {
            error!(?err, "schedule tick failed");
        }
    }
}

/// Process every schedule due as of `now`, in store order. Returns the
/// number of due entries found.
///
/// One entry's failure never stops the rest of the batch: any failure path
/// still bumps the attempt counter and moves the entry to `failed` with the
/// error recorded.
#[instrument(skip_all)]
pub async fn process_due_schedules(
    pool: &Pool,
    provider: &dyn PublishProvider,
    now: DateTime<Utc>,
) -> Result<usize> {
    let due = db::due_schedules(pool, now).await?;
    if due.is_empty() {
        debug!("no queued schedules due");
        return Ok(0);
    }

    info!(count = due.len(), "processing due schedules");
    for schedule in &due {
        info!(schedule_id = schedule.id, page_id = schedule.page_id, "processing schedule");

        let (status, error) = match publish::publish_page(pool, provider, schedule.page_id).await {
            Ok(log) if log.status == AttemptStatus::Success => (ScheduleStatus::Posted, None),
            Ok(log) => (ScheduleStatus::Failed, Some(log.message)),
            Err(err) => (ScheduleStatus::Failed, Some(format!("{err:#}"))),
        };

        match &error {
            None => info!(schedule_id = schedule.id, "schedule posted"),
            Some(message) => {
                error!(schedule_id = schedule.id, error = %message, "schedule failed")
            }
        }

        if let Err(err) =
            db::mark_schedule_result(pool, schedule.id, status, error.as_deref()).await
        {
            error!(?err, schedule_id = schedule.id, "failed to record schedule transition");
        }
    }
    info!(count = due.len(), "completed schedule batch");
    Ok(due.len())
}
