//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - Request scheduling and rate limiting
//! - Overall crawl coordination

mod admission;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use admission::{admit, Admission};
pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{build_http_client, build_http_client_with_timeout, fetch_url, FetchResult};
pub use parser::parse_html;
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::EngineError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Initialize the storage layer
/// 2. Load or create a crawl run
/// 3. Build the HTTP client
/// 4. Schedule and fetch pages
/// 5. Extract and follow links
/// 6. Generate summary output
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Fingerprint of the loaded config file, tagged onto the run record
/// * `fresh` - Start a brand-new run even if an interrupted one is on record
///
/// # Returns
///
/// * `Ok(())` - Crawl completed successfully
/// * `Err(EngineError)` - Crawl failed
pub async fn crawl(config: Config, config_hash: String, fresh: bool) -> Result<(), EngineError> {
    run_crawl(config, config_hash, fresh).await
}
