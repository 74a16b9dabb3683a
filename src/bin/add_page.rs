use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use confluence_publisher::{attachment, config, db};

/// Create a page (with optional attachments) in the local store.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page title
    #[arg(long)]
    title: String,

    /// Page body in Confluence storage format
    #[arg(long)]
    content: String,

    /// Target space key; defaults to confluence.default_space
    #[arg(long)]
    space: Option<String>,

    /// Parent page id on the remote system
    #[arg(long)]
    parent: Option<String>,

    /// Files to attach, in upload order
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
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

    let mut attachment_ids = Vec::with_capacity(args.attachments.len());
    for path in &args.attachments {
        let id = attachment::store_file(&pool, &cfg.app.attachment_dir, path, None).await?;
        attachment_ids.push(id);
    }

    let space_key = args
        .space
        .unwrap_or_else(|| cfg.confluence.default_space.clone());
    let page_id = db::insert_page(
        &pool,
        &args.title,
        &args.content,
        &space_key,
        args.parent.as_deref(),
        &attachment_ids,
    )
    .await?;

    println!("Created page {page_id} in space {space_key}");
    if !attachment_ids.is_empty() {
        println!("Attachments: {attachment_ids:?}");
    }
    Ok(())
}
