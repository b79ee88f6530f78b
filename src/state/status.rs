/// Crawl status shared by hubs and article records
///
/// Hubs move through `Processed -> AtWork -> {Processed, Error}` on every
/// crawl. Article records only ever carry `Processed` or `Error`.
use std::fmt;

/// Represents the outcome (or in-progress marker) of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlStatus {
    /// Last crawl finished without a listing failure
    #[default]
    Processed,

    /// A crawl session currently owns the hub
    AtWork,

    /// Last crawl hit a listing failure or a malformed hub link
    Error,
}

impl CrawlStatus {
    /// Returns true if this is a terminal state of a crawl session
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AtWork)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::AtWork => "at_work",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "at_work" => Some(Self::AtWork),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> [Self; 3] {
        [Self::Processed, Self::AtWork, Self::Error]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
