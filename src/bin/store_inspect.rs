use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use asset_importer::config;
use asset_importer::db;

#[derive(Parser, Debug)]
#[command(about = "List images registered in the image store")]
struct Args {
    /// Path to YAML config (built-in defaults when omitted and ./config.yaml is absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Image store database URL (overrides app.database_url)
    #[arg(long)]
    database_url: Option<String>,

    /// Only list images carrying this tag (e.g. support-logos)
    #[arg(long)]
    tag: Option<String>,

    /// Print records as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let cfg = config::load(args.config.as_deref())?;
    let database_url = args.database_url.unwrap_or(cfg.app.database_url);
    if database_url.trim().is_empty() {
        return Err(anyhow!("no image store configured"));
    }

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    let images = db::list_images(&pool, args.tag.as_deref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&images)?);
        return Ok(());
    }

    println!("Images: {}", images.len());
    for img in images {
        println!(
            "  #{} {} ({} bytes) [{}] {}",
            img.id,
            img.title,
            img.byte_len,
            img.tags.join(", "),
            img.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
