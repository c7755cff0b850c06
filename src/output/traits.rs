//! Output handler traits and types
//!
//! This module defines the trait interface for output handlers and
//! associated data structures for crawl summaries.

use crate::state::PageState;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Summary statistics for a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,

    // Overall statistics
    pub total_pages: u64,
    pub unique_domains: u64,
    pub total_links: u64,
    pub total_errors: u64,

    // State breakdown
    pub pages_discovered: u64,
    pub pages_queued: u64,
    pub pages_processed: u64,
    pub pages_blacklisted: u64,
    pub pages_stubbed: u64,
    pub pages_dead_link: u64,
    pub pages_unreachable: u64,
    pub pages_rate_limited: u64,
    pub pages_failed: u64,
    pub pages_depth_exceeded: u64,
    pub pages_request_limit_hit: u64,
    pub pages_content_mismatch: u64,

    // Depth breakdown (depth -> count)
    pub depth_breakdown: HashMap<u32, u64>,

    // Discovered domains list
    pub discovered_domains: Vec<String>,

    // Top blacklisted URLs with reference counts
    pub top_blacklisted: Vec<(String, u32)>,

    // Top stubbed URLs with reference counts
    pub top_stubbed: Vec<(String, u32)>,

    // Error summary (state -> count)
    pub error_summary: HashMap<PageState, u64>,

    // Rate-limited domains
    pub rate_limited_domains: Vec<String>,

    // Quality domains crawled
    pub quality_domains: Vec<String>,
}

impl CrawlSummary {
    /// Creates a new empty crawl summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of pages in terminal states
    pub fn total_terminal_pages(&self) -> u64 {
        self.pages_processed
            + self.pages_blacklisted
            + self.pages_stubbed
            + self.pages_dead_link
            + self.pages_unreachable
            + self.pages_rate_limited
            + self.pages_failed
            + self.pages_depth_exceeded
            + self.pages_request_limit_hit
            + self.pages_content_mismatch
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.pages_processed as f64 / terminal as f64) * 100.0
    }

    /// Returns the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        let terminal = self.total_terminal_pages();
        if terminal == 0 {
            return 0.0;
        }
        (self.total_errors as f64 / terminal as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_summary_new() {
        let summary = CrawlSummary::new();
        assert_eq!(summary.total_pages, 0);
        assert_eq!(summary.unique_domains, 0);
    }

    #[test]
    fn test_total_terminal_pages() {
        let mut summary = CrawlSummary::new();
        summary.pages_processed = 100;
        summary.pages_failed = 10;
        summary.pages_blacklisted = 5;

        assert_eq!(summary.total_terminal_pages(), 115);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = CrawlSummary::new();
        summary.pages_processed = 80;
        summary.pages_failed = 20;

        let rate = summary.success_rate();
        assert!((rate - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_zero_pages() {
        let summary = CrawlSummary::new();
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn test_error_rate() {
        let mut summary = CrawlSummary::new();
        summary.pages_processed = 90;
        summary.pages_failed = 5;
        summary.pages_dead_link = 3;
        summary.pages_unreachable = 2;
        summary.total_errors = 10;

        let rate = summary.error_rate();
        assert!((rate - 10.0).abs() < 0.01);
    }
}
