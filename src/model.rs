use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a schedule entry. `Queued` is the only non-terminal state;
/// once `Posted` or `Failed` the poller never picks the entry up again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    Queued,
    Posted,
    Failed,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Queued => "queued",
            ScheduleStatus::Posted => "posted",
            ScheduleStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(ScheduleStatus::Queued),
            "posted" => Some(ScheduleStatus::Posted),
            "failed" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Outcome of a single publish attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    Error,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Success => "success",
            AttemptStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(AttemptStatus::Success),
            "error" => Some(AttemptStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub space_key: String,
    pub parent_page_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub page_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishLog {
    pub id: i64,
    pub page_id: i64,
    pub provider: String,
    pub space_key: Option<String>,
    pub confluence_page_id: Option<String>,
    pub status: AttemptStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
