use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use confluence_publisher::{config, provider};

/// Query the backend status of a published page by its remote id.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Remote page id returned by a publish attempt
    #[arg(long)]
    remote_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let provider = provider::select_provider(&cfg);
    let status = provider.get_status(&args.remote_id).await;
    println!("{} [{}]: {}", args.remote_id, provider.name(), status);
    Ok(())
}
