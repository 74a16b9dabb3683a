use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use confluence_publisher::{config, db, provider, publish};

/// Publish a page immediately, bypassing the scheduler.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page id to publish
    #[arg(long)]
    page_id: i64,

    /// Show this many recent attempts for the page afterwards
    #[arg(long, default_value_t = 5)]
    history: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/publisher.db", cfg.app.data_dir));
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let provider = provider::select_provider(&cfg);
    let log = publish::publish_page(&pool, provider.as_ref(), args.page_id).await?;

    println!(
        "[{}] provider={} remote_id={} message={}",
        log.status.as_str(),
        log.provider,
        log.confluence_page_id.as_deref().unwrap_or("-"),
        log.message
    );

    let history = db::list_publish_logs(&pool, args.page_id, args.history).await?;
    if history.len() > 1 {
        println!("Recent attempts:");
        for entry in history {
            println!(
                "  #{} {} [{}] {}",
                entry.id,
                entry.created_at.to_rfc3339(),
                entry.status.as_str(),
                entry.message
            );
        }
    }
    Ok(())
}
