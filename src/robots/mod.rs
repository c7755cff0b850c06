//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! It respects robots.txt directives when crawling websites.

mod parser;

pub use parser::ParsedRobots;

use crate::EngineError;
use std::time::Duration;

/// Fetches robots.txt for a domain.
///
/// Degrades to [`ParsedRobots::allow_all`] on any failure (timeout,
/// connection error, non-success status, or a non-UTF8 body) rather than
/// propagating an error: a missing or broken robots.txt must never block
/// the crawl.
///
/// # Arguments
///
/// * `domain` - The domain to fetch robots.txt from
/// * `user_agent` - The user agent string to use
///
/// # Returns
///
/// * `Ok(ParsedRobots)` - Always succeeds; content reflects whatever (if
///   anything) was fetched.
pub async fn fetch_robots(domain: &str, user_agent: &str) -> Result<ParsedRobots, EngineError> {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(domain, error = %e, "failed to build robots.txt client, allowing all");
            return Ok(ParsedRobots::allow_all());
        }
    };

    let url = format!("https://{}/robots.txt", domain);
    let response = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!(domain, error = %e, "robots.txt fetch failed, allowing all");
            return Ok(ParsedRobots::allow_all());
        }
    };

    if !response.status().is_success() {
        tracing::debug!(domain, status = %response.status(), "robots.txt not available, allowing all");
        return Ok(ParsedRobots::allow_all());
    }

    match response.text().await {
        Ok(body) => Ok(ParsedRobots::from_content(&body)),
        Err(e) => {
            tracing::debug!(domain, error = %e, "robots.txt body unreadable, allowing all");
            Ok(ParsedRobots::allow_all())
        }
    }
}
