//! Admission control for discovered URLs.
//!
//! Every link pulled out of a fetched page runs through [`admit`] before it
//! is allowed anywhere near the frontier. The checks run in a fixed order so
//! that a URL's fate is always decided by the first rule that applies to it,
//! and is cheap-to-expensive: syntax first, domain classification next
//! (cached lookups against the configured lists), then the storage-backed
//! checks that need a database round trip.

use crate::config::Config;
use crate::state::PageState;
use crate::storage::Storage;
use crate::url::{classify_domain, extract_domain, matches_wildcard, normalize_url, DomainClassification};
use std::collections::HashSet;
use url::Url;

/// Outcome of running a discovered URL through admission control.
pub enum Admission {
    /// The URL is in scope and not previously seen; safe to enqueue.
    Admitted { normalized: Url, domain: String },
    /// The URL was rejected; `state` is the terminal [`PageState`] it should
    /// be recorded under and `reason` is a short diagnostic for logging.
    Rejected {
        state: PageState,
        reason: &'static str,
    },
}

/// Runs a raw link string through the full admission pipeline.
///
/// `admitted_in_run` is a set of normalized URLs already admitted during the
/// current run; it prevents the same URL from being enqueued twice when it
/// is discovered from more than one page before storage has recorded it.
/// `seed_hosts` is the set of hosts explicitly named by configured seeds,
/// used as the scope fallback when `scope.allowed-domains` is empty.
pub fn admit(
    raw_url: &str,
    config: &Config,
    seed_hosts: &HashSet<String>,
    admitted_in_run: &mut HashSet<String>,
    storage: &dyn Storage,
    current_run: i64,
) -> Admission {
    let normalized = match normalize_url(raw_url) {
        Ok(url) => url,
        Err(_) => {
            return Admission::Rejected {
                state: PageState::Rejected,
                reason: "malformed URL",
            }
        }
    };

    let Some(domain) = extract_domain(&normalized) else {
        return Admission::Rejected {
            state: PageState::Rejected,
            reason: "URL has no host",
        };
    };

    let classification = classify_domain(&domain, config);
    match classification {
        DomainClassification::Blacklisted => {
            return Admission::Rejected {
                state: PageState::Blacklisted,
                reason: "domain is blacklisted",
            }
        }
        DomainClassification::Stubbed => {
            return Admission::Rejected {
                state: PageState::Stubbed,
                reason: "domain is stubbed",
            }
        }
        DomainClassification::Quality | DomainClassification::Discovered => {}
    }

    if !host_in_scope(&domain, classification, config, seed_hosts) {
        return Admission::Rejected {
            state: PageState::Rejected,
            reason: "host not in scope",
        };
    }

    let url_str = normalized.as_str();
    if config
        .scope
        .exclude_url_patterns
        .iter()
        .any(|pattern| url_str.to_lowercase().contains(&pattern.to_lowercase()))
    {
        return Admission::Rejected {
            state: PageState::Rejected,
            reason: "matched an exclude pattern",
        };
    }

    if !admitted_in_run.insert(url_str.to_string()) {
        return Admission::Rejected {
            state: PageState::Rejected,
            reason: "already admitted this run",
        };
    }

    if !config.crawler.revisit {
        match storage.get_page_by_url(url_str) {
            Ok(Some(page)) if page.visited_at.is_some() && page.discovered_run != current_run => {
                return Admission::Rejected {
                    state: PageState::Rejected,
                    reason: "already visited in a prior run",
                };
            }
            _ => {}
        }
    }

    Admission::Admitted {
        normalized,
        domain,
    }
}

/// Whether `domain` falls within the configured crawl scope.
///
/// A domain classified as [`DomainClassification::Quality`] is always in
/// scope regardless of `scope.allowed-domains`: quality domains are seeded
/// explicitly and are meant to be crawled fully. For everything else, an
/// empty `allowed-domains` list falls back to the hosts named by the
/// configured seed URLs (the "seed host only" default); a non-empty list is
/// matched with the same exact-or-subdomain rule robots.txt groups use.
fn host_in_scope(
    domain: &str,
    classification: DomainClassification,
    config: &Config,
    seed_hosts: &HashSet<String>,
) -> bool {
    if classification == DomainClassification::Quality {
        return true;
    }

    if config.scope.allowed_domains.is_empty() {
        return seed_hosts.contains(domain)
            || seed_hosts
                .iter()
                .any(|seed| matches_wildcard(&format!("*.{seed}"), domain));
    }

    config
        .scope
        .allowed_domains
        .iter()
        .any(|pattern| matches_wildcard(pattern, domain))
}
