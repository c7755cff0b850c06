use serde::Deserialize;

/// Main configuration structure for the crawl engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperIdentity,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default, rename = "change-detection")]
    pub change_detection: ChangeDetectionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
    #[serde(default)]
    pub quality: Vec<QualityEntry>,
    #[serde(default)]
    pub blacklist: Vec<DomainEntry>,
    #[serde(default)]
    pub stub: Vec<DomainEntry>,
}

/// Identifies a scraper across runs; the id keys the persistent visited set.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperIdentity {
    #[serde(default = "default_scraper_id")]
    pub id: String,
    #[serde(default = "default_scraper_name")]
    pub name: String,
}

impl Default for ScraperIdentity {
    fn default() -> Self {
        Self {
            id: default_scraper_id(),
            name: default_scraper_name(),
        }
    }
}

fn default_scraper_id() -> String {
    "default".to_string()
}

fn default_scraper_name() -> String {
    "default".to_string()
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from seed URLs
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Hard cap on total URLs processed in a run; unset means unbounded
    #[serde(default, rename = "max-pages")]
    pub max_pages: Option<u64>,

    /// Maximum number of concurrent in-flight fetches (semaphore size)
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Maximum time between requests to the same domain (milliseconds);
    /// widened beyond `min_delay_ms` when a domain signals rate-limiting
    #[serde(default = "default_max_delay_ms", rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Maximum number of requests per domain
    #[serde(rename = "max-domain-requests")]
    pub max_domain_requests: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_seconds", rename = "request-timeout-seconds")]
    pub request_timeout_seconds: u64,

    /// Consult robots.txt before admitting a URL
    #[serde(default = "default_true", rename = "respect-robots-txt")]
    pub respect_robots_txt: bool,

    /// Re-fetch URLs already marked visited in a prior run for this scraper id
    #[serde(default, rename = "revisit")]
    pub revisit: bool,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Directory for per-URL and document artifacts (documents/, *.html, *.meta.json)
    #[serde(default = "default_output_dir", rename = "output-dir")]
    pub output_dir: String,
}

fn default_output_dir() -> String {
    "./output".to_string()
}

/// Seed URLs and scoping policy, independent of the per-domain quality/blacklist/stub lists
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScopeConfig {
    /// Seed URLs; combined with every `quality` entry's seeds
    #[serde(default, rename = "start-urls")]
    pub start_urls: Vec<String>,

    /// Host whitelist; empty means "seed host only"
    #[serde(default, rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Case-insensitive substrings; a URL matching any of these is rejected at admission
    #[serde(default, rename = "exclude-url-patterns")]
    pub exclude_url_patterns: Vec<String>,
}

/// Change-detection policy
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeDetectionConfig {
    #[serde(default = "default_true", rename = "enabled")]
    pub enabled: bool,

    #[serde(default = "default_true", rename = "track-content-versions")]
    pub track_content_versions: bool,

    #[serde(default = "default_max_versions", rename = "max-versions-to-keep")]
    pub max_versions_to_keep: u32,

    #[serde(
        default = "default_significant_threshold",
        rename = "significant-change-threshold"
    )]
    pub significant_change_threshold: u32,

    #[serde(default, rename = "notify-on-changes")]
    pub notify_on_changes: bool,

    #[serde(default, rename = "notification-email")]
    pub notification_email: Option<String>,

    #[serde(default, rename = "keyword-alert-list")]
    pub keyword_alert_list: Vec<String>,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            track_content_versions: true,
            max_versions_to_keep: default_max_versions(),
            significant_change_threshold: default_significant_threshold(),
            notify_on_changes: false,
            notification_email: None,
            keyword_alert_list: Vec::new(),
        }
    }
}

fn default_max_versions() -> u32 {
    20
}

fn default_significant_threshold() -> u32 {
    3
}

/// Persistence policy for the state manager
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true", rename = "enable-persistent-state")]
    pub enable_persistent_state: bool,

    #[serde(default = "default_true", rename = "store-content-in-database")]
    pub store_content_in_database: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enable_persistent_state: true,
            store_content_in_database: true,
        }
    }
}

/// Capability gating: which optional fetch/processing paths are enabled
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CapabilitiesConfig {
    #[serde(default, rename = "process-js-heavy-pages")]
    pub process_js_heavy_pages: bool,

    #[serde(default = "default_true", rename = "process-pdf-documents")]
    pub process_pdf_documents: bool,

    #[serde(default = "default_true", rename = "process-office-documents")]
    pub process_office_documents: bool,
}

/// Quality domain entry with seed URLs
#[derive(Debug, Clone, Deserialize)]
pub struct QualityEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    /// List of seed URLs to start crawling from
    pub seeds: Vec<String>,
}

/// Simple domain entry for blacklist and stub lists
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}
