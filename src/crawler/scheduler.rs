//! Periodic hub scheduler
//!
//! This module handles:
//! - Selecting hubs that are due for a crawl
//! - Starting one independent session per due hub
//! - The long-running trigger loop and its graceful shutdown

use crate::crawler::{CrawlContext, CrawlSession};
use crate::state::Hub;
use crate::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Starts a session for every hub due at `now`
///
/// Each returned session already owns its hub (persisted as `AtWork`), so a
/// later call cannot pick the same hub again while it is being crawled.
pub async fn start_due_sessions(
    ctx: &CrawlContext,
    now: DateTime<Utc>,
) -> Result<Vec<CrawlSession>> {
    let due = ctx.storage.run_blocking(move |s| s.list_due_hubs(now)).await?;
    let mut sessions = Vec::with_capacity(due.len());

    for hub in due {
        let label = hub.label();
        match CrawlSession::start(ctx.clone(), hub).await {
            Ok(session) => sessions.push(session),
            Err(e) => tracing::error!("[{}] Failed to start crawl: {}", label, e),
        }
    }

    Ok(sessions)
}

/// Spawns a crawl for every due hub into `sessions`
///
/// # Returns
///
/// The number of crawls started
pub async fn trigger_due_hubs(
    ctx: &CrawlContext,
    sessions: &mut JoinSet<Result<Hub>>,
) -> Result<usize> {
    let started = start_due_sessions(ctx, Utc::now()).await?;
    let count = started.len();

    for session in started {
        sessions.spawn(session.run());
    }

    if count > 0 {
        tracing::info!("Started {} hub crawl(s), {} running", count, sessions.len());
    }

    Ok(count)
}

/// Crawls every hub that is currently due and waits for all of them
pub async fn run_once(ctx: &CrawlContext) -> Result<Vec<Hub>> {
    let mut sessions = JoinSet::new();
    trigger_due_hubs(ctx, &mut sessions).await?;

    let mut finished = Vec::new();
    while let Some(joined) = sessions.join_next().await {
        if let Some(hub) = reap(joined) {
            finished.push(hub);
        }
    }

    Ok(finished)
}

/// Runs the trigger loop until `shutdown` resolves
///
/// Due hubs are checked on every tick of the configured schedule interval.
/// After shutdown no new crawls are started; running ones are awaited.
pub async fn run_scheduler<F>(ctx: CrawlContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(ctx.crawler.schedule_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sessions: JoinSet<Result<Hub>> = JoinSet::new();
    tokio::pin!(shutdown);

    tracing::info!(
        "Scheduler started, checking for due hubs every {:?}",
        ctx.crawler.schedule_interval()
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                reap(joined);
            }
            _ = ticker.tick() => {
                if let Err(e) = trigger_due_hubs(&ctx, &mut sessions).await {
                    tracing::error!("Failed to check for due hubs: {}", e);
                }
            }
        }
    }

    if !sessions.is_empty() {
        tracing::info!(
            "Shutdown requested, waiting for {} running crawl(s)",
            sessions.len()
        );
    }
    while let Some(joined) = sessions.join_next().await {
        reap(joined);
    }

    tracing::info!("Scheduler stopped");
    Ok(())
}

fn reap(joined: std::result::Result<Result<Hub>, tokio::task::JoinError>) -> Option<Hub> {
    match joined {
        Ok(Ok(hub)) => {
            tracing::debug!(
                "[{}] Next check at {}",
                hub.label(),
                hub.next_check_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
            Some(hub)
        }
        Ok(Err(e)) => {
            tracing::error!("Crawl session failed: {}", e);
            None
        }
        Err(e) => {
            tracing::error!("Crawl session task failed: {}", e);
            None
        }
    }
}
