use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use confluence_publisher::{config, db};

/// Enqueue a page for scheduled publishing.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page id to schedule
    #[arg(long)]
    page_id: i64,

    /// Target instant (RFC 3339, e.g. 2026-08-07T18:00:00Z); omit for "now"
    #[arg(long)]
    at: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/publisher.db", cfg.app.data_dir));
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    // Page must exist before a schedule can point at it.
    let page = db::get_page(&pool, args.page_id).await?;
    let schedule = db::create_schedule(&pool, page.id, args.at).await?;

    println!(
        "Schedule {} created for page {} at {} (status: {})",
        schedule.id,
        schedule.page_id,
        schedule.scheduled_at.to_rfc3339(),
        schedule.status.as_str()
    );
    Ok(())
}
