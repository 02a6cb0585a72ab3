//! RSVP Indexer binary.
//!
//! Replays a JSON-lines file of contract logs into a SQLite entity store,
//! resuming from the last committed block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use rsvp_indexer::metadata::{IpfsGateway, MetadataEnricher};
use rsvp_indexer::{BlockProcessor, IndexerConfig, LogDecoder, SqliteStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rsvp_indexer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = IndexerConfig::from_env()?;
    config.validate()?;

    tracing::info!("Starting RSVP Indexer");
    tracing::info!("Database URL: {}", config.database_url);
    tracing::info!("Logs path: {}", config.logs_path);

    let store = Arc::new(
        SqliteStore::connect(&config.database_url)
            .await
            .with_context(|| format!("failed to open {}", config.database_url))?,
    );

    let decoder = match config.parse_contract_address()? {
        Some(address) => LogDecoder::for_contract(address),
        None => LogDecoder::new(),
    };
    match decoder.contract() {
        Some(address) => tracing::info!("Contract filter: {}", address),
        None => tracing::info!("Contract filter: none"),
    }

    let enricher = if config.metadata_enabled {
        let gateway = IpfsGateway::new(config.gateway_config())?;
        tracing::info!(
            "Metadata gateway: {} (timeout {:?}, {} retries)",
            gateway.config().base_url,
            gateway.config().timeout,
            gateway.config().max_retries
        );
        Some(
            MetadataEnricher::new(Arc::new(gateway))
                .with_image_base_url(config.image_base_url.clone()),
        )
    } else {
        tracing::info!("Metadata enrichment disabled");
        None
    };

    let mut processor = BlockProcessor::new(Arc::clone(&store), decoder, enricher);
    processor.resume().await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, stopping after current block");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    let committed = processor
        .process_file(&config.logs_path, &shutdown)
        .await
        .with_context(|| format!("failed to index {}", config.logs_path))?;
    tracing::info!("Committed {} blocks", committed);

    let snapshot = processor.metrics().snapshot();
    tracing::info!(
        blocks_processed = snapshot.blocks_processed,
        blocks_skipped = snapshot.blocks_skipped,
        events_applied = snapshot.events_applied,
        events_duplicate = snapshot.events_duplicate,
        events_orphaned = snapshot.events_orphaned,
        decode_errors = snapshot.decode_errors,
        metadata_failures = snapshot.metadata_failures,
        average_block_time = ?snapshot.average_block_time,
        "processing finished"
    );
    for (kind, count) in store.counts().await? {
        tracing::info!(kind = kind.as_str(), count, "stored entities");
    }
    tracing::info!(last_block = ?processor.cursor().last_block, "store summary");

    store.close().await;
    tracing::info!("Shutting down indexer");

    Ok(())
}
