//! Configuration module for the crawl engine.
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use terraphage::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CapabilitiesConfig, ChangeDetectionConfig, Config, CrawlerConfig, DomainEntry, OutputConfig,
    PersistenceConfig, QualityEntry, ScopeConfig, ScraperIdentity, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
