//! URL handling module for Terraphage
//!
//! This module provides URL normalization, domain extraction, wildcard matching,
//! and domain classification functionality. The three primitives
//! (`extract_domain`, `matches_wildcard`, `normalize_url`) live here rather
//! than in their own files because every caller in this crate reaches them
//! only through [`classify_domain`] or the admission scope check in
//! `crawler::admission` — neither primitive has an independent concern of
//! its own in this crawler.

mod normalize;

use crate::config::Config;
use url::Url;

pub use normalize::{normalize_url, safe_name};

/// Extracts the lowercased host from a URL, per admission rule 1's
/// "lower-case host" step. Returns `None` if the URL has no host (opaque
/// schemes, or malformed input that parsed anyway).
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks `candidate` against a domain pattern from `blacklist`/`stub`/
/// `quality`/`scope.allowed-domains`: `"*.example.com"` matches
/// `example.com` and any subdomain of it, anything else must match exactly.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// Domain classification types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainClassification {
    /// Quality domain - should be fully crawled
    Quality,
    /// Blacklisted domain - record but skip
    Blacklisted,
    /// Stubbed domain - note but never visit
    Stubbed,
    /// Discovered domain - found during crawl
    Discovered,
}

impl DomainClassification {
    /// Returns true if the domain should be crawled
    pub fn should_crawl(&self) -> bool {
        matches!(self, Self::Quality | Self::Discovered)
    }

    /// Returns true if the domain is terminal (should not be visited)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Blacklisted | Self::Stubbed)
    }
}

/// Classifies a domain according to the configuration
///
/// This function checks the domain against the configuration's domain lists
/// in the following priority order:
/// 1. Blacklist (highest priority)
/// 2. Stub list
/// 3. Quality list
/// 4. Discovered (default)
///
/// # Arguments
///
/// * `domain` - The domain string to classify (should be lowercase)
/// * `config` - The crawler configuration
///
/// # Returns
///
/// The classification of the domain
///
/// # Examples
///
/// ```no_run
/// use terraphage::config::Config;
/// use terraphage::url::{classify_domain, DomainClassification};
///
/// # fn example(config: &Config) {
/// let classification = classify_domain("example.com", config);
/// match classification {
///     DomainClassification::Quality => println!("Will crawl fully"),
///     DomainClassification::Blacklisted => println!("Will skip"),
///     DomainClassification::Stubbed => println!("Will note but not visit"),
///     DomainClassification::Discovered => println!("New domain found"),
/// }
/// # }
/// ```
pub fn classify_domain(domain: &str, config: &Config) -> DomainClassification {
    // Priority 1: Check blacklist
    for entry in &config.blacklist {
        if matches_wildcard(&entry.domain, domain) {
            return DomainClassification::Blacklisted;
        }
    }

    // Priority 2: Check stub list
    for entry in &config.stub {
        if matches_wildcard(&entry.domain, domain) {
            return DomainClassification::Stubbed;
        }
    }

    // Priority 3: Check quality list
    for entry in &config.quality {
        if matches_wildcard(&entry.domain, domain) {
            return DomainClassification::Quality;
        }
    }

    // Default: Discovered
    DomainClassification::Discovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, DomainEntry, OutputConfig, QualityEntry, UserAgentConfig};

    #[test]
    fn extract_domain_lowercases_host() {
        let url = Url::parse("https://EXAMPLE.com/path").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn extract_domain_keeps_subdomains() {
        let url = Url::parse("https://api.v2.example.com/endpoint").unwrap();
        assert_eq!(extract_domain(&url), Some("api.v2.example.com".to_string()));
    }

    #[test]
    fn matches_wildcard_exact() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "sub.example.com"));
    }

    #[test]
    fn matches_wildcard_subdomain_glob() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "blog.example.com"));
        assert!(matches_wildcard("*.example.com", "deep.nested.example.com"));
        assert!(!matches_wildcard("*.example.com", "notexample.com"));
    }

    fn create_test_config() -> Config {
        Config {
            scraper: crate::config::ScraperIdentity::default(),
            crawler: CrawlerConfig {
                max_depth: 3,
                max_pages: None,
                max_concurrent_requests: 10,
                min_delay_ms: 1000,
                max_delay_ms: 30_000,
                max_domain_requests: 500,
                request_timeout_seconds: 30,
                respect_robots_txt: true,
                revisit: false,
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
                summary_path: "./summary.md".to_string(),
                output_dir: "./output".to_string(),
            },
            scope: crate::config::ScopeConfig::default(),
            change_detection: crate::config::ChangeDetectionConfig::default(),
            persistence: crate::config::PersistenceConfig::default(),
            capabilities: crate::config::CapabilitiesConfig::default(),
            quality: vec![QualityEntry {
                domain: "quality.com".to_string(),
                seeds: vec!["https://quality.com/".to_string()],
            }],
            blacklist: vec![DomainEntry {
                domain: "bad.com".to_string(),
            }],
            stub: vec![DomainEntry {
                domain: "stub.com".to_string(),
            }],
        }
    }

    #[test]
    fn test_classify_quality_domain() {
        let config = create_test_config();
        assert_eq!(
            classify_domain("quality.com", &config),
            DomainClassification::Quality
        );
    }

    #[test]
    fn test_classify_blacklisted_domain() {
        let config = create_test_config();
        assert_eq!(
            classify_domain("bad.com", &config),
            DomainClassification::Blacklisted
        );
    }

    #[test]
    fn test_classify_stubbed_domain() {
        let config = create_test_config();
        assert_eq!(
            classify_domain("stub.com", &config),
            DomainClassification::Stubbed
        );
    }

    #[test]
    fn test_classify_discovered_domain() {
        let config = create_test_config();
        assert_eq!(
            classify_domain("random.com", &config),
            DomainClassification::Discovered
        );
    }

    #[test]
    fn test_priority_blacklist_over_stub() {
        let mut config = create_test_config();
        config.blacklist.push(DomainEntry {
            domain: "conflict.com".to_string(),
        });
        config.stub.push(DomainEntry {
            domain: "conflict.com".to_string(),
        });

        assert_eq!(
            classify_domain("conflict.com", &config),
            DomainClassification::Blacklisted
        );
    }

    #[test]
    fn test_priority_blacklist_over_quality() {
        let mut config = create_test_config();
        config.blacklist.push(DomainEntry {
            domain: "conflict.com".to_string(),
        });
        config.quality.push(QualityEntry {
            domain: "conflict.com".to_string(),
            seeds: vec!["https://conflict.com/".to_string()],
        });

        assert_eq!(
            classify_domain("conflict.com", &config),
            DomainClassification::Blacklisted
        );
    }

    #[test]
    fn test_priority_stub_over_quality() {
        let mut config = create_test_config();
        config.stub.push(DomainEntry {
            domain: "conflict.com".to_string(),
        });
        config.quality.push(QualityEntry {
            domain: "conflict.com".to_string(),
            seeds: vec!["https://conflict.com/".to_string()],
        });

        assert_eq!(
            classify_domain("conflict.com", &config),
            DomainClassification::Stubbed
        );
    }

    #[test]
    fn test_wildcard_classification() {
        let mut config = create_test_config();
        config.blacklist.push(DomainEntry {
            domain: "*.bad.com".to_string(),
        });

        assert_eq!(
            classify_domain("bad.com", &config),
            DomainClassification::Blacklisted
        );
        assert_eq!(
            classify_domain("sub.bad.com", &config),
            DomainClassification::Blacklisted
        );
        assert_eq!(
            classify_domain("deep.sub.bad.com", &config),
            DomainClassification::Blacklisted
        );
    }

    #[test]
    fn test_should_crawl() {
        assert!(DomainClassification::Quality.should_crawl());
        assert!(DomainClassification::Discovered.should_crawl());
        assert!(!DomainClassification::Blacklisted.should_crawl());
        assert!(!DomainClassification::Stubbed.should_crawl());
    }

    #[test]
    fn test_is_terminal() {
        assert!(!DomainClassification::Quality.is_terminal());
        assert!(!DomainClassification::Discovered.is_terminal());
        assert!(DomainClassification::Blacklisted.is_terminal());
        assert!(DomainClassification::Stubbed.is_terminal());
    }
}
