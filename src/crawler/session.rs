//! Per-hub crawl session
//!
//! A session owns one hub for the duration of a crawl:
//! - The hub is marked `AtWork` when the session starts
//! - A pool of workers drains the session's work queue, where listing pages
//!   discover further listing pages and articles
//! - A flusher persists finished records in batches while the workers run
//! - Once the queue has drained, the workers are stopped, the flusher runs its
//!   final flush, and only then is the hub's outcome written and the hub
//!   rescheduled
//!
//! The hub is released through a drop guard, so its status and check times
//! are written on every exit path, cancellation included. A session dropped
//! mid-crawl still lets its in-flight handlers finish and flushes their
//! records before the hub is released.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::buffer::{FlushReport, Flusher, ResultBuffer};
use crate::crawler::parser::{
    article_api_url, article_page_url, extract_hub_name, listing_url, ArticlePayload,
    ListingPayload,
};
use crate::crawler::{FetchError, Fetcher, HubRef, WorkItem, WorkQueue};
use crate::state::{ArticleRecord, CrawlStatus, Hub};
use crate::storage::{SharedStorage, StorageError, StorageResult};
use crate::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Everything a crawl session needs from the outside world
///
/// Cheap to clone; every running session holds its own copy.
#[derive(Clone)]
pub struct CrawlContext {
    pub crawler: Arc<CrawlerConfig>,
    pub fetcher: Arc<Fetcher>,
    pub storage: SharedStorage,
}

impl CrawlContext {
    pub fn new(crawler: CrawlerConfig, fetcher: Fetcher, storage: SharedStorage) -> Self {
        Self {
            crawler: Arc::new(crawler),
            fetcher: Arc::new(fetcher),
            storage,
        }
    }

    /// Builds the HTTP fetcher from the configuration
    pub fn from_config(config: &Config, storage: SharedStorage) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config.crawler, &config.user_agent)?;
        Ok(Self::new(config.crawler.clone(), fetcher, storage))
    }
}

/// Exclusive hold on a hub while it is being crawled
///
/// Released explicitly with the crawl outcome; if dropped without release
/// the hub is written back as `Error` and rescheduled anyway.
struct HubLease {
    storage: SharedStorage,
    hub: Option<Hub>,
}

impl HubLease {
    async fn acquire(storage: SharedStorage, mut hub: Hub) -> StorageResult<Self> {
        hub.status = CrawlStatus::AtWork;

        // Armed before the write lands, so a cancelled claim still releases the hub
        let mut lease = Self {
            storage: storage.clone(),
            hub: Some(hub.clone()),
        };
        if let Err(e) = storage.run_blocking(move |s| s.save_hub(&hub)).await {
            lease.hub = None;
            return Err(e);
        }

        Ok(lease)
    }

    async fn release(mut self, outcome: CrawlStatus) -> StorageResult<Hub> {
        let mut hub = self
            .hub
            .clone()
            .ok_or_else(|| StorageError::Database("hub lease already released".to_string()))?;

        hub.reschedule(outcome, Utc::now());
        let released = hub.clone();
        self.storage
            .run_blocking(move |s| s.save_hub(&released))
            .await?;

        self.hub = None;
        Ok(hub)
    }

    /// Synchronous release for drop paths, where nothing can be awaited
    fn release_now(&mut self, outcome: CrawlStatus) -> StorageResult<Option<Hub>> {
        let Some(mut hub) = self.hub.take() else {
            return Ok(None);
        };

        hub.reschedule(outcome, Utc::now());
        self.storage.with(|s| s.save_hub(&hub))?;
        Ok(Some(hub))
    }
}

impl Drop for HubLease {
    fn drop(&mut self) {
        if self.hub.is_none() {
            return;
        }

        match self.release_now(CrawlStatus::Error) {
            Ok(Some(hub)) => {
                tracing::warn!("[{}] Crawl interrupted, hub marked as error", hub.label())
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to release interrupted hub: {}", e),
        }
    }
}

/// State shared by the workers of one session
struct SessionShared {
    ctx: CrawlContext,
    label: String,
    hub_name: String,
    hub: HubRef,
    links_per_page: u32,
    max_pages: u32,
    queue: Arc<WorkQueue<WorkItem>>,
    buffer: Arc<ResultBuffer>,
    failed: AtomicBool,
    processed: AtomicUsize,
    errored: AtomicUsize,
    dropped: AtomicUsize,
}

impl SessionShared {
    async fn handle(&self, item: WorkItem) {
        match item {
            WorkItem::ListingPage { page } => self.fetch_listing(page).await,
            WorkItem::ArticleFetch { article_id, hub } => self.fetch_article(article_id, hub).await,
        }
    }

    async fn fetch_listing(&self, page: u32) {
        let url = listing_url(
            &self.ctx.crawler.api_base,
            &self.hub_name,
            page,
            self.links_per_page,
        );

        let listing: ListingPayload = match self.ctx.fetcher.fetch_json(&url).await {
            Ok(listing) => listing,
            Err(e @ FetchError::Status { .. }) => {
                tracing::error!("[{}] Listing page {} refused: {}", self.label, page, e);
                self.failed.store(true, Ordering::SeqCst);
                return;
            }
            // Transient failures lose the page but leave the hub's outcome alone
            Err(e) => {
                tracing::error!("[{}] Listing page {} skipped: {}", self.label, page, e);
                return;
            }
        };

        // Only the first page fans out; the API's page count is capped by max_pages
        if page <= 1 {
            let last_page = listing.pages_count().min(self.max_pages);
            for next in 2..=last_page {
                self.queue.put(WorkItem::ListingPage { page: next });
            }
            tracing::info!(
                "[{}] API reports {} pages, crawling {}",
                self.label,
                listing.pages_count(),
                last_page.max(1)
            );
        }

        let ids = listing.article_ids();
        tracing::debug!(
            "[{}] Listing page {} has {} articles",
            self.label,
            page,
            ids.len()
        );

        for article_id in ids {
            self.queue.put(WorkItem::ArticleFetch {
                article_id,
                hub: self.hub.clone(),
            });
        }
    }

    async fn fetch_article(&self, article_id: i64, hub: HubRef) {
        let url = article_api_url(&self.ctx.crawler.api_base, article_id);
        let site_base = &self.ctx.crawler.site_base;

        match self.ctx.fetcher.fetch_json::<ArticlePayload>(&url).await {
            Ok(payload) => {
                self.buffer
                    .push(payload.into_record(article_id, &hub, site_base));
                self.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e @ FetchError::Status { .. }) => {
                tracing::warn!("[{}] Article {} refused: {}", self.label, article_id, e);
                self.buffer.push(ArticleRecord::errored(
                    article_id,
                    hub.id,
                    &hub.link,
                    article_page_url(site_base, article_id),
                ));
                self.errored.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!("[{}] Article {} dropped: {}", self.label, article_id, e);
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

async fn worker_loop(shared: Arc<SessionShared>, worker_id: u32) {
    loop {
        let (item, done) = shared.queue.get().await;
        let description = item.describe();
        tracing::trace!("[{}] Worker {} took {}", shared.label, worker_id, description);

        // A panicking handler only loses its own item. The item stays in
        // flight until its handler returns, even if this worker is aborted.
        let handler = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                let _done = done;
                shared.handle(item).await
            })
        };

        if let Err(e) = handler.await {
            tracing::error!(
                "[{}] Worker {} failed on {}: {}",
                shared.label,
                worker_id,
                description,
                e
            );
        }
    }
}

/// Waits for the final flush, logging instead of failing
async fn finish_flusher(label: &str, flusher: Flusher) -> FlushReport {
    match flusher.finish().await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("[{}] Flusher failed: {}", label, e);
            FlushReport::default()
        }
    }
}

/// Running parts of a session that must be wound down in order
///
/// If the session future is dropped before [`SessionTeardown::disarm`], the
/// workers are aborted. A background task then waits for in-flight handlers
/// and the final flush before releasing the hub as `Error`.
struct SessionTeardown {
    shared: Arc<SessionShared>,
    workers: JoinSet<()>,
    armed: Option<(Flusher, HubLease)>,
}

impl SessionTeardown {
    fn disarm(&mut self) -> Option<(Flusher, HubLease)> {
        self.armed.take()
    }
}

impl Drop for SessionTeardown {
    fn drop(&mut self) {
        let Some((flusher, lease)) = self.armed.take() else {
            return;
        };

        self.workers.abort_all();

        // Without a runtime the flusher and lease fall back to their own drop paths
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            shared.queue.wait_in_flight().await;

            let abandoned = shared.queue.len();
            if abandoned > 0 {
                tracing::warn!(
                    "[{}] Crawl interrupted with {} queued items left",
                    shared.label,
                    abandoned
                );
            }

            let report = finish_flusher(&shared.label, flusher).await;
            match lease.release(CrawlStatus::Error).await {
                Ok(_) => tracing::warn!(
                    "[{}] Crawl interrupted, hub marked as error after storing {} new rows",
                    shared.label,
                    report.inserted
                ),
                Err(e) => tracing::error!("[{}] Failed to release interrupted hub: {}", shared.label, e),
            }
        });
    }
}

/// One crawl of one hub
pub struct CrawlSession {
    ctx: CrawlContext,
    hub: Hub,
    lease: HubLease,
}

impl CrawlSession {
    /// Takes ownership of the hub by persisting it as `AtWork`
    pub async fn start(ctx: CrawlContext, hub: Hub) -> Result<Self> {
        let lease = HubLease::acquire(ctx.storage.clone(), hub.clone()).await?;
        let mut hub = hub;
        hub.status = CrawlStatus::AtWork;

        Ok(Self { ctx, hub, lease })
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Crawls the hub and writes its outcome
    ///
    /// Fetch failures never surface here; they end up in the returned hub's
    /// status and in the stored records. Only a failure to write the hub back
    /// is returned as an error.
    pub async fn run(self) -> Result<Hub> {
        let CrawlSession { ctx, hub, lease } = self;
        let label = hub.label();

        let Some(hub_name) = extract_hub_name(&hub.hub_link) else {
            tracing::error!(
                "[{}] Hub link '{}' does not name a hub, skipping crawl",
                label,
                hub.hub_link
            );
            return Ok(lease.release(CrawlStatus::Error).await?);
        };

        tracing::info!(
            "[{}] Crawl started: hub '{}', {} workers, up to {} pages",
            label,
            hub_name,
            hub.max_workers.max(1),
            hub.max_pages
        );

        let buffer = Arc::new(ResultBuffer::new());
        let flusher = Flusher::spawn(
            Arc::clone(&buffer),
            ctx.storage.clone(),
            hub.batch_size as usize,
            ctx.crawler.flush_interval(),
            label.clone(),
        );

        let shared = Arc::new(SessionShared {
            ctx,
            label: label.clone(),
            hub_name,
            hub: HubRef {
                id: hub.id,
                link: Arc::from(hub.hub_link.as_str()),
            },
            links_per_page: hub.links_per_page,
            max_pages: hub.max_pages,
            queue: Arc::new(WorkQueue::new()),
            buffer,
            failed: AtomicBool::new(false),
            processed: AtomicUsize::new(0),
            errored: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        });

        shared.queue.put(WorkItem::ListingPage { page: 1 });

        let mut teardown = SessionTeardown {
            shared: Arc::clone(&shared),
            workers: JoinSet::new(),
            armed: Some((flusher, lease)),
        };
        for worker_id in 0..hub.max_workers.max(1) {
            teardown
                .workers
                .spawn(worker_loop(Arc::clone(&shared), worker_id));
        }

        shared.queue.join().await;
        teardown.workers.shutdown().await;

        let Some((flusher, lease)) = teardown.disarm() else {
            return Err(StorageError::Database("crawl session already torn down".to_string()).into());
        };

        // Everything fetched must be stored before the hub reports its outcome
        let report = finish_flusher(&label, flusher).await;

        let outcome = if shared.failed.load(Ordering::SeqCst) {
            CrawlStatus::Error
        } else {
            CrawlStatus::Processed
        };

        let hub = lease.release(outcome).await?;

        tracing::info!(
            "[{}] Crawl finished with status {}: {} processed, {} errored, {} dropped, {} new rows stored",
            label,
            hub.status,
            shared.processed.load(Ordering::Relaxed),
            shared.errored.load(Ordering::Relaxed),
            shared.dropped.load(Ordering::Relaxed),
            report.inserted
        );
        if report.lost > 0 {
            tracing::error!("[{}] {} records could not be stored", label, report.lost);
        }

        Ok(hub)
    }
}

/// Runs one complete crawl of `hub`
pub async fn crawl_hub(ctx: CrawlContext, hub: Hub) -> Result<Hub> {
    CrawlSession::start(ctx, hub).await?.run().await
}
