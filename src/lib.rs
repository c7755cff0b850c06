//! Terraphage: a stateful, pluggable web-crawling and content-monitoring engine.
//!
//! The crate is organized as a kernel plus a set of collaborating components:
//! a URL processor drives the fetch loop, a state manager owns durable
//! storage, a change detector fingerprints pages across runs, an adaptive
//! prioritizer ranks the frontier, and a metrics tracker aggregates counters.
//! Components advertise typed capabilities to the kernel rather than being
//! looked up by name; see [`kernel`] for the registry and lifecycle model.

#[cfg(feature = "browser")]
pub mod browser;
pub mod change_detector;
pub mod config;
pub mod content_extractor;
pub mod crawler;
pub mod document;
pub mod kernel;
pub mod metrics;
pub mod output;
pub mod prioritizer;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Top-level error type for the crawl engine.
///
/// Each taxonomy bucket from the error-handling design gets its own variant
/// so callers can match on failure class without inspecting strings: fetch
/// failures, persistence failures, extraction failures and document
/// failures are all distinguishable at the type level.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Change detector error: {0}")]
    ChangeDetector(#[from] change_detector::ChangeDetectorError),

    #[error("Content extraction error: {0}")]
    Extraction(#[from] content_extractor::ExtractionError),

    #[error("Document processing error: {0}")]
    Document(#[from] document::DocumentError),

    #[error("Missing required capability: {0}")]
    MissingCapability(&'static str),

    #[error("Run aborted: {0}")]
    RunAborted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use kernel::Kernel;
pub use state::{DomainState, PageState};
pub use url::{classify_domain, extract_domain, normalize_url, DomainClassification};
