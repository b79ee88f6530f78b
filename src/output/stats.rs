//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! hub and article statistics from the storage layer.

use crate::state::CrawlStatus;
use crate::storage::Storage;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-hub line of the statistics report
#[derive(Debug, Clone, PartialEq)]
pub struct HubStatistics {
    pub id: i64,
    pub name: Option<String>,
    pub hub_link: String,
    pub status: CrawlStatus,
    pub last_checked_at: DateTime<Utc>,
    pub next_check_at: Option<DateTime<Utc>>,

    /// Stored articles attributed to this hub
    pub articles: u64,
}

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of stored articles
    pub total_articles: u64,

    /// Count of articles by status
    pub articles_by_status: HashMap<CrawlStatus, u64>,

    /// One entry per configured hub, ordered by ID
    pub hubs: Vec<HubStatistics>,
}

impl HarvestStatistics {
    pub fn articles_with_status(&self, status: CrawlStatus) -> u64 {
        self.articles_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    let total_articles = storage.count_articles()?;

    let mut articles_by_status = HashMap::new();
    for status in [CrawlStatus::Processed, CrawlStatus::Error] {
        let count = storage.count_articles_by_status(status)?;
        if count > 0 {
            articles_by_status.insert(status, count);
        }
    }

    let mut hubs = Vec::new();
    for hub in storage.list_hubs()? {
        let articles = storage.count_articles_for_hub(hub.id)?;
        hubs.push(HubStatistics {
            id: hub.id,
            name: hub.name,
            hub_link: hub.hub_link,
            status: hub.status,
            last_checked_at: hub.last_checked_at,
            next_check_at: hub.next_check_at,
            articles,
        });
    }

    Ok(HarvestStatistics {
        total_articles,
        articles_by_status,
        hubs,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Hubs: {}", stats.hubs.len());
    println!("  Total articles stored: {}", stats.total_articles);
    println!();

    println!("Articles by Status:");
    let mut status_counts: Vec<_> = stats.articles_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_articles > 0 {
            (*count as f64 / stats.total_articles as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.hubs.is_empty() {
        println!("Hubs:");
        for hub in &stats.hubs {
            let next = hub
                .next_check_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "now".to_string());
            println!(
                "  [{}] {} {}",
                hub.id,
                hub.name.as_deref().unwrap_or("-"),
                hub.hub_link
            );
            println!(
                "      status: {}, articles: {}, next check: {}",
                hub.status, hub.articles, next
            );
        }
        println!();
    }

    let processed = stats.articles_with_status(CrawlStatus::Processed);
    let success_rate = if stats.total_articles > 0 {
        (processed as f64 / stats.total_articles as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} articles successfully processed)",
        success_rate, processed, stats.total_articles
    );
}
