//! Skillgraph Search CLI
//!
//! Runs a full skill inference for one developer and prints the profile:
//! 1. Loads a snapshot file, or fetches a login from the configured source
//! 2. Builds and freezes the HIN
//! 3. Runs one DeepPath search per skill and fuses the paths
//!
//! Usage: `search <snapshot.json | login> [skill ...]`. Ctrl+C cancels the run.

use anyhow::Context;
use skillgraph_common::{config::AppConfig, oracle::create_oracle, VERSION};
use skillgraph_ingestion::{create_source, source::SnapshotSource};
use skillgraph_search::InferenceEngine;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Logs go to stderr so stdout stays valid JSON
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("Starting Skillgraph Search v{}", VERSION);

    let mut args = std::env::args().skip(1);
    let target = args
        .next()
        .context("usage: search <snapshot.json | login> [skill ...]")?;
    let skills: Vec<String> = args.collect();

    let snapshot = if target.ends_with(".json") {
        SnapshotSource::read_file(Path::new(&target)).await?
    } else {
        let source = create_source(&config.source)?;
        info!(source = source.name(), login = %target, "Fetching activity");
        source.fetch(&target).await?
    };
    let login = if snapshot.developer.login.trim().is_empty() {
        Path::new(&target)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&target)
            .to_string()
    } else {
        snapshot.developer.login.clone()
    };

    let oracle = create_oracle(&config)?;
    info!(oracle = oracle.name(), "Scoring oracle ready");
    let engine = InferenceEngine::new(Arc::new(config), oracle);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling inference");
            on_interrupt.cancel();
        }
    });

    let hypotheses = (!skills.is_empty()).then_some(skills.as_slice());
    let run = engine
        .infer(&login, &snapshot, hypotheses, cancel)
        .await
        .context("Inference failed")?;

    println!("{}", serde_json::to_string_pretty(&run.profile)?);
    Ok(())
}
