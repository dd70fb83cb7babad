//! Crawl controller - the per-source pagination loop
//!
//! This module drives one source from its checkpoint to the end of its
//! result set:
//! - Retrying identifiers whose detail fetch failed on an earlier run
//! - Requesting pages and walking their summaries in order
//! - Fetching, transforming and staging each unseen record
//! - Appending a page's records and then saving the checkpoint
//! - Stopping cleanly at page boundaries when shutdown is requested

use crate::config::CrawlerConfig;
use crate::crawler::shutdown::ShutdownFlag;
use crate::crawler::transport::Transport;
use crate::output::{SourceOutcome, SourceReport};
use crate::record::{transform, NormalizedRecord, Page, RawRecord};
use crate::source::Source;
use crate::state::{Checkpoint, CrawlState};
use crate::storage::{CheckpointStore, JsonlSink};
use crate::{HarvestError, Result, TransportError};
use serde_json::Value;
use std::time::Duration;

/// Controller parameters taken from `[crawler]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    pub page_size: u32,
    /// Re-issues of a failed list query before the source is abandoned
    pub page_retries: u32,
    pub page_retry_delay: Duration,
    pub retry_failed_items: bool,
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            page_size: config.page_size,
            page_retries: config.page_retries,
            page_retry_delay: Duration::from_secs(config.page_retry_delay_secs),
            retry_failed_items: config.retry_failed_items,
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Records staged for one page, appended together at the page boundary
#[derive(Debug, Default)]
struct Batch {
    raw: Vec<RawRecord>,
    normalized: Vec<NormalizedRecord>,
}

impl Batch {
    fn push(&mut self, raw: RawRecord) {
        self.normalized.push(transform(&raw));
        self.raw.push(raw);
    }

    fn len(&self) -> usize {
        self.raw.len()
    }
}

/// Walks one source from its checkpoint to completion
///
/// The controller exclusively owns the source's checkpoint for the duration
/// of `run`; nothing else writes it.
pub struct CrawlController<'a, S: CheckpointStore> {
    source: &'a Source,
    settings: CrawlSettings,
    transport: &'a mut Transport,
    store: &'a mut S,
    sink: &'a JsonlSink,
    shutdown: ShutdownFlag,
    checkpoint: Checkpoint,
    state: CrawlState,
    report: SourceReport,
}

impl<'a, S: CheckpointStore> CrawlController<'a, S> {
    /// Creates a controller, loading the source's checkpoint
    pub fn new(
        source: &'a Source,
        settings: CrawlSettings,
        transport: &'a mut Transport,
        store: &'a mut S,
        sink: &'a JsonlSink,
        shutdown: ShutdownFlag,
    ) -> Result<Self> {
        let checkpoint = store.load(&source.id)?;
        let cursor = checkpoint.cursor;

        Ok(Self {
            source,
            settings,
            transport,
            store,
            sink,
            shutdown,
            checkpoint,
            state: CrawlState::start(cursor),
            report: SourceReport::new(source.id.clone(), cursor),
        })
    }

    /// Runs the source to completion, interruption or failure
    ///
    /// Transport failures on list pages end the source with a `Failed`
    /// outcome in the report. Storage failures and illegal state transitions
    /// are returned as errors.
    pub async fn run(mut self) -> Result<SourceReport> {
        let source_id = self.source.id.clone();
        if self.checkpoint.cursor > 0 {
            tracing::info!(
                "Resuming {} from offset {} ({} records already seen)",
                source_id,
                self.checkpoint.cursor,
                self.checkpoint.seen.len()
            );
        } else {
            tracing::info!("Starting {} from the beginning", source_id);
        }

        if self.settings.retry_failed_items && !self.checkpoint.failed.is_empty() {
            self.retry_failed_items().await?;
        }

        while !self.state.is_terminal() {
            let cursor = self.checkpoint.cursor;

            if self.should_stop() {
                tracing::info!("Stopping {} at offset {} on shutdown", source_id, cursor);
                self.report.outcome = SourceOutcome::Interrupted;
                break;
            }

            if self.state.is_page_boundary() {
                self.transition(CrawlState::Querying { cursor })?;
                continue;
            }

            let (page, next) = match self.fetch_page(cursor).await {
                Ok(fetched) => fetched,
                Err(HarvestError::Transport(e)) => {
                    tracing::error!(
                        "Abandoning {} at offset {}: {}",
                        source_id,
                        cursor,
                        e
                    );
                    self.report.outcome = SourceOutcome::Failed(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };

            let len = page.items.len();
            self.transition(CrawlState::PageFetched { cursor, items: len })?;
            self.report.pages += 1;
            if page.total.is_some() {
                self.report.total = page.total;
            }

            if page.is_empty() {
                tracing::info!("{}: empty page at offset {}, done", source_id, cursor);
                self.transition(CrawlState::Done)?;
                break;
            }

            let mut batch = Batch::default();
            for (index, item) in page.items.iter().enumerate() {
                self.transition(CrawlState::Processing { index, len })?;
                self.process_item(item, &mut batch).await;
            }

            let next = self.persist_page(&batch, next)?;
            self.log_progress(&page, batch.len());

            if page.is_exhausted_at(next) {
                tracing::info!("{}: reached end of results at offset {}", source_id, next);
                self.transition(CrawlState::Done)?;
            } else if next <= cursor {
                tracing::warn!(
                    "{}: offset did not advance past {}, stopping",
                    source_id,
                    cursor
                );
                self.transition(CrawlState::Done)?;
            }
        }

        self.report.final_cursor = self.checkpoint.cursor;
        tracing::info!(
            "{} {}: {} written, {} skipped, {} failed, offset {}",
            source_id,
            self.report.outcome,
            self.report.written,
            self.report.skipped_seen + self.report.skipped_invalid,
            self.report.failed_items.len(),
            self.report.final_cursor
        );
        Ok(self.report)
    }

    /// Shutdown is honored only where durable state is consistent: before a
    /// query or right after a page was persisted
    fn should_stop(&self) -> bool {
        self.shutdown.is_triggered()
            && (self.state.is_page_boundary()
                || matches!(self.state, CrawlState::Querying { .. }))
    }

    /// Requests the page at `cursor`, re-issuing the identical query on
    /// retryable failures
    ///
    /// Returns the page with the offset just past it.
    async fn fetch_page(&mut self, cursor: u64) -> Result<(Page, u64)> {
        let params = self.source.list_params(cursor, self.settings.page_size);
        let mut reissues = 0;

        loop {
            let fetched = self
                .transport
                .get_json::<Page>(&self.source.list_url, &params)
                .await
                .and_then(|page| match page.next_offset(cursor) {
                    Some(next) => Ok((page, next)),
                    None => Err(TransportError::Protocol {
                        url: self.source.list_url.clone(),
                        message: format!(
                            "Page offset {:?} with {} items overflows",
                            page.offset,
                            page.items.len()
                        ),
                    }),
                });

            match fetched {
                Ok(fetched) => return Ok(fetched),
                Err(e) if e.is_retryable() && reissues < self.settings.page_retries => {
                    reissues += 1;
                    tracing::warn!(
                        "{}: page at offset {} failed ({}); re-issuing {}/{} in {:?}",
                        self.source.id,
                        cursor,
                        e,
                        reissues,
                        self.settings.page_retries,
                        self.settings.page_retry_delay
                    );
                    self.transport
                        .clock()
                        .sleep(self.settings.page_retry_delay)
                        .await;
                    self.transition(CrawlState::Querying { cursor })?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Handles one summary: skip, or fetch and stage its record
    ///
    /// Never fails; a failed detail fetch only skips this item.
    async fn process_item(&mut self, item: &Value, batch: &mut Batch) {
        let Some(id) = self.source.summary_id(item) else {
            tracing::warn!("{}: summary without identifier, skipping", self.source.id);
            self.report.skipped_invalid += 1;
            return;
        };

        if self.checkpoint.is_seen(&id) {
            tracing::debug!("{}: {} already seen", self.source.id, id);
            self.report.skipped_seen += 1;
            return;
        }

        match self.fetch_detail(&id).await {
            Ok(body) => {
                batch.push(RawRecord::new(id.clone(), body));
                self.checkpoint.mark_seen(&id);
            }
            Err(e) => {
                tracing::warn!("{}: skipping {}: {}", self.source.id, id, e);
                if self.settings.retry_failed_items {
                    self.checkpoint.record_failure(&id);
                }
                self.report.failed_items.push(id);
            }
        }
    }

    async fn fetch_detail(&mut self, id: &str) -> std::result::Result<Value, TransportError> {
        let url = self.source.detail_url(id);
        self.transport.get(&url, &self.source.detail_params()).await
    }

    /// Appends the page's records, then advances and saves the checkpoint
    ///
    /// Returns the cursor now stored.
    fn persist_page(&mut self, batch: &Batch, next: u64) -> Result<u64> {
        self.write_batch(batch)?;
        let cursor = self.checkpoint.advance_to(next);
        self.save_checkpoint()?;
        self.transition(CrawlState::PagePersisted { cursor })?;
        Ok(cursor)
    }

    fn write_batch(&mut self, batch: &Batch) -> Result<()> {
        let id = &self.source.id;
        self.sink.append(&self.sink.raw_path(id), &batch.raw)?;
        self.sink
            .append(&self.sink.transformed_path(id), &batch.normalized)?;
        self.report.written += batch.len() as u64;
        Ok(())
    }

    fn save_checkpoint(&mut self) -> Result<()> {
        self.checkpoint.touch();
        self.store.save(&self.source.id, &self.checkpoint)?;
        Ok(())
    }

    /// Re-fetches identifiers queued by earlier runs
    ///
    /// Client errors (the record is gone or forbidden) drop the identifier
    /// from the queue; other failures keep it for the next run.
    async fn retry_failed_items(&mut self) -> Result<()> {
        let pending: Vec<String> = self.checkpoint.failed.iter().cloned().collect();
        tracing::info!(
            "{}: retrying {} previously failed items",
            self.source.id,
            pending.len()
        );

        let mut batch = Batch::default();
        for id in pending {
            if self.shutdown.is_triggered() {
                break;
            }
            if self.checkpoint.is_seen(&id) {
                self.checkpoint.resolve_failure(&id);
                continue;
            }

            match self.fetch_detail(&id).await {
                Ok(body) => {
                    batch.push(RawRecord::new(id.clone(), body));
                    self.checkpoint.mark_seen(&id);
                    self.report.recovered += 1;
                }
                Err(e @ TransportError::Client { .. }) => {
                    tracing::error!("{}: giving up on {}: {}", self.source.id, id, e);
                    self.checkpoint.resolve_failure(&id);
                    self.report.failed_items.push(id);
                }
                Err(e) => {
                    tracing::warn!("{}: {} still failing: {}", self.source.id, id, e);
                    self.report.failed_items.push(id);
                }
            }
        }

        self.write_batch(&batch)?;
        self.save_checkpoint()?;
        Ok(())
    }

    fn transition(&mut self, next: CrawlState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{}: {} -> {}", self.source.id, self.state, next);
        self.state = next;
        Ok(())
    }

    fn log_progress(&self, page: &Page, written: usize) {
        let cursor = self.checkpoint.cursor;
        match page.total {
            Some(total) if total > 0 => tracing::info!(
                "{}: {}/{} ({:.1}%), {} new records",
                self.source.id,
                cursor.min(total),
                total,
                cursor.min(total) as f64 / total as f64 * 100.0,
                written
            ),
            _ => tracing::info!(
                "{}: offset {}, {} new records",
                self.source.id,
                cursor,
                written
            ),
        }
    }
}
