//! Output module for reporting harvest results
//!
//! This module handles:
//! - Loading hub and article statistics from storage
//! - Printing them as a plain-text report

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics, HubStatistics};
