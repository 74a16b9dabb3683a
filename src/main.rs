use anyhow::Result;
use clap::Parser;
use confluence_publisher::{config, db, provider, scheduler};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
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

    // Provider is resolved once at startup, not per request.
    let provider = provider::select_provider(&cfg);
    info!(
        provider = provider.name(),
        interval = cfg.app.poll_interval_seconds,
        "starting schedule poller"
    );

    scheduler::run(
        pool,
        provider,
        Duration::from_secs(cfg.app.poll_interval_seconds),
    )
    .await;

    Ok(())
}
