//! Skillgraph Ingestion CLI
//!
//! Builds the HIN for one developer and prints the ingestion report and
//! the node/link export as JSON:
//! 1. Loads a snapshot file, or fetches a login from the configured source
//! 2. Runs the HIN builder
//! 3. Prints `{ report, graph }`

use anyhow::Context;
use skillgraph_common::{config::AppConfig, graph::GraphStore, VERSION};
use skillgraph_ingestion::{create_source, source::SnapshotSource, HinBuilder};
use std::path::Path;
use tracing::info;
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

    info!("Starting Skillgraph Ingestion v{}", VERSION);

    let target = std::env::args()
        .nth(1)
        .context("usage: ingestion <snapshot.json | login>")?;

    let snapshot = if target.ends_with(".json") {
        SnapshotSource::read_file(Path::new(&target)).await?
    } else {
        let source = create_source(&config.source)?;
        info!(source = source.name(), login = %target, "Fetching activity");
        source.fetch(&target).await?
    };

    let mut graph = GraphStore::new();
    let report = HinBuilder::from_config(&config)
        .build(&mut graph, &snapshot)
        .context("HIN construction failed")?;

    let output = serde_json::json!({
        "report": report,
        "graph": graph.export(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
