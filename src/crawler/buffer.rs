//! Result buffer and periodic batch flusher
//!
//! Workers append finished records to a [`ResultBuffer`]; a background
//! flusher moves them to storage in batches and performs one final flush of
//! everything left when the session shuts it down.

use crate::state::ArticleRecord;
use crate::storage::SharedStorage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

/// Staging area for records that have not been persisted yet
///
/// Every operation takes the lock once, so batch extraction is atomic with
/// respect to concurrent appends.
#[derive(Debug, Default)]
pub struct ResultBuffer {
    records: Mutex<VecDeque<ArticleRecord>>,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ArticleRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, record: ArticleRecord) {
        self.lock().push_back(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the `batch_size` oldest records once the buffer holds more than `batch_size`
    ///
    /// A buffer holding exactly `batch_size` records is left alone.
    pub fn take_batch(&self, batch_size: usize) -> Option<Vec<ArticleRecord>> {
        let mut records = self.lock();
        if records.len() <= batch_size {
            return None;
        }
        Some(records.drain(..batch_size).collect())
    }

    /// Removes every buffered record
    pub fn drain(&self) -> Vec<ArticleRecord> {
        self.lock().drain(..).collect()
    }

    /// Puts records that could not be persisted back at the front, keeping their order
    pub fn restore(&self, batch: Vec<ArticleRecord>) {
        let mut records = self.lock();
        for record in batch.into_iter().rev() {
            records.push_front(record);
        }
    }
}

/// What a flusher persisted over its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Batches submitted successfully
    pub batches: usize,

    /// Records submitted successfully
    pub submitted: usize,

    /// Rows actually inserted (duplicates of stored articles are ignored)
    pub inserted: usize,

    /// Records dropped because the final flush failed
    pub lost: usize,
}

/// Handle to a running flusher
///
/// Dropping the handle also triggers the final flush.
pub struct Flusher {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<FlushReport>,
}

impl Flusher {
    /// Starts the flusher for one session
    pub fn spawn(
        buffer: Arc<ResultBuffer>,
        storage: SharedStorage,
        batch_size: usize,
        interval: Duration,
        label: String,
    ) -> Self {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_flusher(
            buffer,
            storage,
            batch_size.max(1),
            interval,
            label,
            shutdown_rx,
        ));
        Self { shutdown, task }
    }

    /// Stops the periodic checks and waits for the final flush
    pub async fn finish(self) -> Result<FlushReport, JoinError> {
        let _ = self.shutdown.send(());
        self.task.await
    }
}

async fn run_flusher(
    buffer: Arc<ResultBuffer>,
    storage: SharedStorage,
    batch_size: usize,
    interval: Duration,
    label: String,
    mut shutdown: oneshot::Receiver<()>,
) -> FlushReport {
    let mut report = FlushReport::default();

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Either an explicit stop or the session being dropped
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Some(batch) = buffer.take_batch(batch_size) {
                    let count = batch.len();
                    match storage.insert_articles(batch).await {
                        Ok(inserted) => {
                            report.batches += 1;
                            report.submitted += count;
                            report.inserted += inserted;
                            tracing::info!("[{}] Saved batch of {} records ({} new)", label, count, inserted);
                        }
                        Err((e, batch)) => {
                            tracing::error!("[{}] Failed to save batch of {} records: {}", label, count, e);
                            buffer.restore(batch);
                        }
                    }
                }
            }
        }
    }

    let mut remaining = buffer.drain();
    if !remaining.is_empty() {
        tracing::info!(
            "[{}] Flusher stopping, saving {} remaining records",
            label,
            remaining.len()
        );
    }

    while !remaining.is_empty() {
        let tail = remaining.split_off(batch_size.min(remaining.len()));
        let chunk = std::mem::replace(&mut remaining, tail);
        let count = chunk.len();

        match storage.insert_articles(chunk).await {
            Ok(inserted) => {
                report.batches += 1;
                report.submitted += count;
                report.inserted += inserted;
                tracing::info!("[{}] Saved batch of {} records ({} new)", label, count, inserted);
            }
            Err((e, _)) => {
                report.lost += count;
                tracing::error!(
                    "[{}] Final flush failed, {} records not saved: {}",
                    label,
                    count,
                    e
                );
            }
        }
    }

    report
}
