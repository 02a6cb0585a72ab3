//! Block processor implementation.
//!
//! Decodes each block's logs, dispatches them to the handlers through a
//! per-block write batch, and commits the batch together with the advanced
//! ledger cursor.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::cursor::LedgerCursor;
use super::metrics::IndexerMetrics;
use super::types::{Block, BlockResult};
use crate::decoder::LogDecoder;
use crate::error::IndexerResult;
use crate::handlers::{self, HandlerContext};
use crate::metadata::MetadataEnricher;
use crate::source::read_blocks;
use crate::store::{BlockBatch, EntityStore, StoreResult};

/// Sequential processor for blocks of contract logs.
///
/// Blocks are handled one at a time and logs within a block in log-index
/// order. A block is the unit of atomicity: if anything fails before the
/// commit, nothing of that block is stored and the cursor stays put, so
/// reprocessing the block yields the same end state.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use rsvp_indexer::{BlockProcessor, LogDecoder, MemoryStore};
///
/// let store = Arc::new(MemoryStore::new());
/// let mut processor = BlockProcessor::new(store, LogDecoder::new(), None);
/// processor.resume().await?;
///
/// for block in blocks {
///     let result = processor.process_block(&block).await?;
///     println!("block {}: {} applied", result.block_number, result.applied);
/// }
/// ```
pub struct BlockProcessor<S: EntityStore> {
    /// Entity store.
    store: Arc<S>,

    /// Log decoder.
    decoder: LogDecoder,

    /// Optional metadata enricher.
    enricher: Option<MetadataEnricher>,

    /// Last committed position.
    cursor: LedgerCursor,

    /// Metrics for monitoring.
    metrics: Arc<IndexerMetrics>,
}

impl<S: EntityStore> BlockProcessor<S> {
    /// Creates a processor starting from a fresh cursor.
    ///
    /// Call [`BlockProcessor::resume`] to continue from the store's cursor.
    #[must_use]
    pub fn new(store: Arc<S>, decoder: LogDecoder, enricher: Option<MetadataEnricher>) -> Self {
        Self {
            store,
            decoder,
            enricher,
            cursor: LedgerCursor::new(),
            metrics: Arc::new(IndexerMetrics::new()),
        }
    }

    /// Loads the committed cursor from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn resume(&mut self) -> StoreResult<&LedgerCursor> {
        self.cursor = self.store.cursor().await?;
        info!(
            last_block = ?self.cursor.last_block,
            blocks_processed = self.cursor.blocks_processed,
            "resuming from ledger cursor"
        );
        Ok(&self.cursor)
    }

    /// Returns the last committed cursor.
    #[must_use]
    pub const fn cursor(&self) -> &LedgerCursor {
        &self.cursor
    }

    /// Returns a reference to the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<IndexerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the entity store.
    #[must_use]
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Returns true if the block has already been committed.
    #[must_use]
    pub fn is_processed(&self, block_number: u64) -> bool {
        self.cursor.is_processed(block_number)
    }

    /// Processes one block and commits its writes with the advanced cursor.
    ///
    /// Blocks at or below the cursor are skipped without touching the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails; the block is then not committed.
    pub async fn process_block(&mut self, block: &Block) -> StoreResult<BlockResult> {
        if self.cursor.is_processed(block.number) {
            debug!(block = block.number, "block already committed, skipping");
            self.metrics.record_skipped_block();
            return Ok(BlockResult::skipped(block.number));
        }

        let start = Instant::now();
        let mut result = BlockResult::empty(block.number);

        let mut logs: Vec<_> = block.logs.iter().collect();
        logs.sort_by_key(|log| log.log_index);

        let ctx = HandlerContext {
            enricher: self.enricher.as_ref(),
            metrics: &self.metrics,
        };
        let mut batch = BlockBatch::new(self.store.as_ref());

        for log in logs {
            let event = match self.decoder.decode(log) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    result.ignored += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        block = block.number,
                        log_index = log.log_index,
                        tx = log.transaction_hash.as_deref().unwrap_or("-"),
                        error = %e,
                        "failed to decode log"
                    );
                    result.decode_errors += 1;
                    continue;
                }
            };

            let outcome = handlers::dispatch(&mut batch, ctx, &event).await?;
            result.record(log.log_index, outcome);
        }

        let writes = batch.into_writes();
        result.writes = writes.len();

        let next = self
            .cursor
            .advanced(block.number, result.events_processed as u64);
        self.store.commit(writes, &next).await?;
        self.cursor = next;

        let elapsed = start.elapsed();
        self.metrics.record_block(&result, elapsed);

        if !result.is_empty() || result.decode_errors > 0 {
            info!(
                block = block.number,
                events = result.events_processed,
                applied = result.applied,
                dropped = result.dropped.len(),
                decode_errors = result.decode_errors,
                writes = result.writes,
                "block committed"
            );
        }

        Ok(result)
    }

    /// Processes blocks in order, stopping at the first store error.
    ///
    /// # Errors
    ///
    /// Returns the first store error; earlier blocks remain committed.
    pub async fn process_blocks(&mut self, blocks: &[Block]) -> StoreResult<Vec<BlockResult>> {
        let mut results = Vec::with_capacity(blocks.len());
        for block in blocks {
            results.push(self.process_block(block).await?);
        }
        Ok(results)
    }

    /// Reads a JSON-lines log file and processes its blocks in order.
    ///
    /// `stop` is checked between blocks; once set, the remaining blocks are
    /// left for the next run. Returns the number of blocks committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the store fails.
    pub async fn process_file(
        &mut self,
        path: impl AsRef<Path>,
        stop: &AtomicBool,
    ) -> IndexerResult<usize> {
        let blocks = read_blocks(path).await?;
        info!(blocks = blocks.len(), "loaded log file");

        let mut committed = 0;
        for block in &blocks {
            if stop.load(Ordering::Relaxed) {
                info!(next_block = block.number, "stop requested, leaving remaining blocks");
                break;
            }
            let result = self.process_block(block).await?;
            if !result.already_processed {
                committed += 1;
            }
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::fixtures;
    use crate::decoder::RawLog;
    use crate::entities::{attendance_id, Account, Address, Event, EventId, Rsvp};
    use crate::events::types::DropReason;
    use crate::metadata::enricher::fakes::StaticSource;
    use crate::metadata::FALLBACK_IMAGE_URL;
    use crate::store::MemoryStore;
    use std::io::Write;
    use tokio_test::assert_ok;

    const EVENT: [u8; 32] = [0xAA; 32];
    const ATTENDEE: [u8; 20] = [0xBB; 20];

    fn processor() -> BlockProcessor<MemoryStore> {
        BlockProcessor::new(Arc::new(MemoryStore::new()), LogDecoder::new(), None)
    }

    fn lifecycle_blocks() -> Vec<Block> {
        vec![
            Block::new(
                10,
                vec![fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 10, 0)],
            ),
            Block::new(11, vec![fixtures::rsvp(EVENT, ATTENDEE, 11, 0)]),
            Block::new(12, vec![fixtures::confirmed(EVENT, ATTENDEE, 12, 0)]),
            Block::new(13, vec![fixtures::paid_out(EVENT, 13, 0)]),
        ]
    }

    #[tokio::test]
    async fn test_processor_new() {
        let processor = processor();
        assert_eq!(processor.cursor(), &LedgerCursor::new());
        assert_eq!(processor.metrics().blocks_processed(), 0);
    }

    #[tokio::test]
    async fn test_processor_end_to_end() {
        let mut processor = processor();
        let results = assert_ok!(processor.process_blocks(&lifecycle_blocks()).await);
        assert!(results.iter().all(|r| r.applied == 1));

        let store = processor.store();
        let event = store
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert_eq!(event.total_rsvps, 1);
        assert_eq!(event.total_confirmed_attendees, 1);
        assert!(event.paid_out);

        let account = store
            .get::<Account>(&Address(ATTENDEE).to_hex())
            .await
            .expect("account");
        assert_eq!(account.total_rsvps, 1);
        assert_eq!(account.total_attended_events, 1);

        assert_eq!(processor.cursor().last_block, Some(13));
        assert_eq!(processor.cursor().events_processed, 4);
    }

    #[tokio::test]
    async fn test_processor_skips_committed_blocks() {
        let mut processor = processor();
        let blocks = lifecycle_blocks();
        assert_ok!(processor.process_blocks(&blocks).await);

        let replay = assert_ok!(processor.process_block(&blocks[1]).await);
        assert!(replay.already_processed);
        assert!(replay.is_empty());
        assert_eq!(processor.metrics().blocks_skipped(), 1);

        let event = processor
            .store()
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert_eq!(event.total_rsvps, 1);
    }

    #[tokio::test]
    async fn test_processor_duplicate_logs_in_block() {
        let mut processor = processor();
        let block = Block::new(
            5,
            vec![
                fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 5, 0),
                fixtures::event_created(EVENT, [0x22; 20], 999, "other", 5, 1),
                fixtures::rsvp(EVENT, ATTENDEE, 5, 2),
                fixtures::rsvp(EVENT, ATTENDEE, 5, 3),
            ],
        );

        let result = assert_ok!(processor.process_block(&block).await);
        assert_eq!(result.events_processed, 4);
        assert_eq!(result.applied, 2);
        assert_eq!(result.dropped_for(DropReason::DuplicateEvent), 1);
        assert_eq!(result.dropped_for(DropReason::DuplicateRsvp), 1);

        let store = processor.store();
        let event = store
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert_eq!(event.deposit, 100);
        assert_eq!(event.total_rsvps, 1);
    }

    #[tokio::test]
    async fn test_processor_orders_logs_by_index() {
        let mut processor = processor();
        let block = Block::new(
            5,
            vec![
                fixtures::rsvp(EVENT, ATTENDEE, 5, 1),
                fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 5, 0),
            ],
        );

        let result = assert_ok!(processor.process_block(&block).await);
        assert_eq!(result.applied, 2);
        assert!(result.dropped.is_empty());
    }

    #[tokio::test]
    async fn test_processor_rsvp_before_event() {
        let mut processor = processor();
        let blocks = vec![
            Block::new(1, vec![fixtures::rsvp(EVENT, ATTENDEE, 1, 0)]),
            Block::new(
                2,
                vec![fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 2, 0)],
            ),
        ];

        let results = assert_ok!(processor.process_blocks(&blocks).await);
        assert_eq!(results[0].dropped_for(DropReason::UnknownEvent), 1);

        let store = processor.store();
        let account = store
            .get::<Account>(&Address(ATTENDEE).to_hex())
            .await
            .expect("account");
        assert_eq!(account.total_rsvps, 0);
        let event = store
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert_eq!(event.total_rsvps, 0);
        assert!(store
            .get::<Rsvp>(&attendance_id(&EventId(EVENT), &Address(ATTENDEE)))
            .await
            .is_none());
        assert_eq!(processor.metrics().events_orphaned(), 1);
    }

    #[tokio::test]
    async fn test_processor_ignores_and_counts_bad_logs() {
        let mut processor = processor();
        let mut broken = fixtures::rsvp(EVENT, ATTENDEE, 3, 1);
        broken.data = "0x1234".to_string();
        let unrelated = RawLog {
            topics: vec!["0x01".to_string()],
            ..fixtures::paid_out(EVENT, 3, 2)
        };
        let block = Block::new(
            3,
            vec![
                fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 3, 0),
                broken,
                unrelated,
            ],
        );

        let result = assert_ok!(processor.process_block(&block).await);
        assert_eq!(result.applied, 1);
        assert_eq!(result.decode_errors, 1);
        assert_eq!(result.ignored, 1);
        assert_eq!(processor.cursor().last_block, Some(3));

        let metrics = processor.metrics();
        assert_eq!(metrics.decode_errors(), 1);
        assert_eq!(metrics.logs_ignored(), 1);
    }

    #[tokio::test]
    async fn test_processor_contract_filter() {
        let store = Arc::new(MemoryStore::new());
        let decoder = LogDecoder::for_contract(Address([0xEE; 20]));
        let mut processor = BlockProcessor::new(Arc::clone(&store), decoder, None);

        let block = Block::new(
            1,
            vec![fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 1, 0)],
        );
        let result = assert_ok!(processor.process_block(&block).await);
        assert_eq!(result.ignored, 1);
        assert!(store.is_empty().await);
        assert_eq!(processor.cursor().last_block, Some(1));
    }

    #[tokio::test]
    async fn test_processor_resume_from_store() {
        let store = Arc::new(MemoryStore::new());
        let blocks = lifecycle_blocks();

        let mut first = BlockProcessor::new(Arc::clone(&store), LogDecoder::new(), None);
        assert_ok!(first.process_blocks(&blocks[..2]).await);

        let mut second = BlockProcessor::new(Arc::clone(&store), LogDecoder::new(), None);
        let cursor = assert_ok!(second.resume().await);
        assert_eq!(cursor.last_block, Some(11));
        assert_ok!(second.process_blocks(&blocks).await);

        assert_eq!(second.metrics().blocks_skipped(), 2);
        assert_eq!(second.metrics().blocks_processed(), 2);
        let event = store
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert_eq!(event.total_rsvps, 1);
        assert!(event.paid_out);
    }

    #[tokio::test]
    async fn test_processor_metadata_fallback() {
        let source = StaticSource::default().with("cid", "not json");
        let enricher = MetadataEnricher::new(Arc::new(source));
        let mut processor =
            BlockProcessor::new(Arc::new(MemoryStore::new()), LogDecoder::new(), Some(enricher));

        let block = Block::new(
            1,
            vec![fixtures::event_created(EVENT, [0x11; 20], 100, "cid", 1, 0)],
        );
        assert_ok!(processor.process_block(&block).await);

        let event = processor
            .store()
            .get::<Event>(&EventId(EVENT).to_hex())
            .await
            .expect("event");
        assert!(event.metadata.name.is_none());
        assert_eq!(event.metadata.image_url.as_deref(), Some(FALLBACK_IMAGE_URL));
        assert_eq!(processor.metrics().metadata_failures(), 1);
    }

    fn write_log_file(logs: &[RawLog]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        for log in logs {
            let line = serde_json::to_string(log).expect("serialize");
            writeln!(file, "{line}").expect("write");
        }
        file
    }

    #[tokio::test]
    async fn test_processor_process_file() {
        let logs: Vec<RawLog> = lifecycle_blocks()
            .into_iter()
            .flat_map(|b| b.logs)
            .collect();
        let file = write_log_file(&logs);
        let mut processor = processor();
        let stop = AtomicBool::new(false);

        let committed = assert_ok!(processor.process_file(file.path(), &stop).await);
        assert_eq!(committed, 4);
        assert_eq!(processor.cursor().last_block, Some(13));

        let again = assert_ok!(processor.process_file(file.path(), &stop).await);
        assert_eq!(again, 0);
        assert_eq!(processor.metrics().blocks_skipped(), 4);
    }

    #[tokio::test]
    async fn test_processor_process_file_stops_between_blocks() {
        let logs: Vec<RawLog> = lifecycle_blocks()
            .into_iter()
            .flat_map(|b| b.logs)
            .collect();
        let file = write_log_file(&logs);
        let mut processor = processor();
        let stop = AtomicBool::new(true);

        let committed = assert_ok!(processor.process_file(file.path(), &stop).await);
        assert_eq!(committed, 0);
        assert_eq!(processor.cursor().last_block, None);
        assert!(processor.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_processor_process_file_missing() {
        let mut processor = processor();
        let result = processor
            .process_file("/nonexistent/rsvp/logs.jsonl", &AtomicBool::new(false))
            .await;
        assert!(matches!(
            result,
            Err(crate::error::IndexerError::Source(_))
        ));
    }

    #[tokio::test]
    async fn test_processor_empty_block_advances_cursor() {
        let mut processor = processor();
        let result = assert_ok!(processor.process_block(&Block::new(0, Vec::new())).await);
        assert!(result.is_empty());
        assert_eq!(processor.cursor().last_block, Some(0));
        assert!(processor.is_processed(0));
    }
}
