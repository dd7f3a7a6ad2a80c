use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use report_engine::catalog::{CachedCatalog, Catalog, ContentPackCatalog, GuardedCatalog, PolicyStore};
use report_engine::config::Config;
use report_engine::{ComposeOptions, ReportComposer, ReportRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging; stdout carries the result
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting report-engine v{}", env!("CARGO_PKG_VERSION"));

    let request = read_request(std::env::args().nth(1).map(PathBuf::from)).await?;

    // Content pack → TTL cache → strict guard
    let pack_root = config.pack_root();
    info!(
        "Content pack: {} (strict={})",
        pack_root.display(),
        config.strict_content
    );
    let catalog = Arc::new(GuardedCatalog::new(
        CachedCatalog::new(
            ContentPackCatalog::new(pack_root),
            Duration::seconds(config.catalog_cache_ttl_secs),
        ),
        config.strict_content,
    ));

    let composer = ReportComposer::new(
        catalog.clone() as Arc<dyn Catalog>,
        catalog as Arc<dyn PolicyStore>,
        ComposeOptions {
            capture_explain: config.capture_explain,
            explain_items_max: config.explain_items_max,
        },
    );

    let selection = composer
        .compose(&request)
        .await
        .with_context(|| format!("Failed to compose report for {:?}", request.attempt_id))?;

    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}

/// Reads the request JSON from `path`, or from stdin when no path is given.
async fn read_request(path: Option<PathBuf>) -> Result<ReportRequest> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read request file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Request is not a valid report request")
}
