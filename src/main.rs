use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use asset_importer::config;
use asset_importer::http::HttpFetcher;
use asset_importer::model::{CategoryFilter, ImportReport, SourceSelector};
use asset_importer::pipeline::{category_counts, ImportOptions, Importer};
use asset_importer::store::{ImageStore, SqliteImageStore};

const DRY_RUN_LISTING: usize = 20;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Import digital assets from the legacy website and CDN"
)]
struct Args {
    /// Path to YAML config file (built-in defaults when omitted and ./config.yaml is absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source to import from
    #[arg(long, value_enum, default_value = "scrape")]
    source: SourceSelector,

    /// Category to import
    #[arg(long, value_enum, default_value = "all")]
    category: CategoryFilter,

    /// Show what would be downloaded without downloading or writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output directory for downloaded files (overrides app.output_dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Template to rewrite (overrides app.template_path)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Rewrite the template's placeholder regions with the imported assets
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    update_template: bool,

    /// Fail when the template or one of its placeholders is missing
    #[arg(long)]
    strict_template: bool,

    /// Degrade downloads that keep failing to skips instead of errors
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    skip_failed: bool,

    /// Image store database URL (overrides app.database_url; empty disables the store)
    #[arg(long)]
    database_url: Option<String>,

    /// CMS username for the legacy API
    #[arg(long, env = "CMS_USER")]
    cms_user: Option<String>,

    /// CMS password for the legacy API
    #[arg(long, env = "CMS_PASS", hide_env_values = true)]
    cms_pass: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load(args.config.as_deref())?;
    if let Some(dir) = &args.output_dir {
        cfg.app.output_dir = dir.to_string_lossy().into_owned();
    }
    if let Some(path) = &args.template {
        cfg.app.template_path = path.to_string_lossy().into_owned();
    }
    if let Some(url) = &args.database_url {
        cfg.app.database_url = url.clone();
    }
    if let Some(user) = &args.cms_user {
        cfg.cms.username = user.clone();
    }
    if let Some(pass) = &args.cms_pass {
        cfg.cms.password = pass.clone();
    }
    config::validate(&cfg)?;

    info!("starting asset import");
    let fetcher = Arc::new(HttpFetcher::from_config(&cfg.http)?);
    let store: Option<Arc<dyn ImageStore>> = if args.dry_run {
        None
    } else {
        SqliteImageStore::open_or_disable(&cfg.app.database_url)
            .await
            .map(|s| Arc::new(s) as Arc<dyn ImageStore>)
    };

    let opts = ImportOptions {
        source: args.source,
        category: args.category,
        dry_run: args.dry_run,
        update_template: args.update_template,
        strict_template: args.strict_template,
        skip_failed: args.skip_failed,
    };
    let importer = Importer::new(cfg, fetcher, store);
    let report = importer.run(&opts).await?;

    if report.dry_run {
        print_dry_run(&report);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_dry_run(report: &ImportReport) {
    println!(
        "Found {} images and {} videos",
        report.image_candidates.len(),
        report.videos.len()
    );
    println!("--- DRY RUN: would download these assets ---");
    println!("Images:");
    for url in report.image_candidates.iter().take(DRY_RUN_LISTING) {
        println!("  - {}", url);
    }
    if report.image_candidates.len() > DRY_RUN_LISTING {
        println!(
            "  ... and {} more",
            report.image_candidates.len() - DRY_RUN_LISTING
        );
    }
    println!("Videos:");
    for v in &report.videos {
        println!("  - Vimeo ID: {} ({})", v.id, v.title);
    }
    println!("--- End of dry run ---");
}

fn print_summary(report: &ImportReport) {
    println!(
        "Processed: {} downloaded, {} skipped (404 or failed)",
        report.success_count, report.skip_count
    );
    for (category, count) in category_counts(&report.assets) {
        println!("  {}: {}", category, count);
    }
    if let Some(t) = &report.template {
        if t.written {
            println!("Template updated ({} regions)", t.applied());
        } else {
            println!("Template unchanged");
        }
        for region in t.missing() {
            println!("  placeholder not found: {}", region.name());
        }
    }
    println!("=== Import Complete ===");
}
