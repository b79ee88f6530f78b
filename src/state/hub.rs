use crate::config::HubEntry;
use crate::state::CrawlStatus;
use chrono::{DateTime, Duration, Utc};

/// One hundred years
const MAX_CHECK_INTERVAL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// A configured crawl target and its crawl policy
#[derive(Debug, Clone, PartialEq)]
pub struct Hub {
    /// Database identifier
    pub id: i64,

    /// Optional human-readable label
    pub name: Option<String>,

    /// Public hub page the API hub name is derived from
    pub hub_link: String,

    /// Minimum time between two crawls (seconds)
    pub check_interval_secs: u64,

    /// When the last crawl finished
    pub last_checked_at: DateTime<Utc>,

    /// When the hub becomes due again; `None` means due immediately
    pub next_check_at: Option<DateTime<Utc>>,

    pub status: CrawlStatus,

    /// Number of concurrent workers per crawl
    pub max_workers: u32,

    /// `perPage` value sent to the listing endpoint
    pub links_per_page: u32,

    /// Hard cap on listing pages fetched per crawl
    pub max_pages: u32,

    /// Number of records persisted per batch
    pub batch_size: u32,
}

impl Hub {
    /// Returns true if the scheduler should start a crawl of this hub at `now`
    ///
    /// Hubs already owned by a session are never due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.status == CrawlStatus::AtWork {
            return false;
        }

        match self.next_check_at {
            Some(next) => next < now,
            None => true,
        }
    }

    /// Marks the end of a crawl: records the outcome and schedules the next one
    pub fn reschedule(&mut self, outcome: CrawlStatus, now: DateTime<Utc>) {
        self.status = outcome;
        self.last_checked_at = now;
        self.next_check_at = Some(now + self.check_interval());
    }

    /// Re-crawl interval, capped so rescheduling can never overflow a timestamp
    pub fn check_interval(&self) -> Duration {
        let secs = self.check_interval_secs.min(MAX_CHECK_INTERVAL_SECS);
        Duration::seconds(secs as i64)
    }

    /// Short label used in log lines
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("hub {} ({})", self.id, name),
            None => format!("hub {}", self.id),
        }
    }
}

/// Hub definition that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewHub {
    pub name: Option<String>,
    pub hub_link: String,
    pub check_interval_secs: u64,
    pub max_workers: u32,
    pub links_per_page: u32,
    pub max_pages: u32,
    pub batch_size: u32,
}

impl From<&HubEntry> for NewHub {
    fn from(entry: &HubEntry) -> Self {
        Self {
            name: entry.name.clone(),
            hub_link: entry.hub_link.clone(),
            check_interval_secs: entry.check_interval_secs,
            max_workers: entry.max_workers,
            links_per_page: entry.links_per_page,
            max_pages: entry.max_pages,
            batch_size: entry.batch_size,
        }
    }
}
