//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process: initializing storage and the kernel's component
//! registry, managing the frontier queue, fetching and parsing pages,
//! running discovered links through admission control, persisting content
//! and change-detection history, and producing the final summary.

use super::admission::{admit, Admission};
use super::fetcher::{
    build_http_client_with_timeout, fetch_url_with_retry, user_agent_string, FetchResult,
    RetryPolicy,
};
use super::parser::parse_html;
use super::scheduler::{QueuedUrl, Scheduler};
use crate::change_detector::ChangeDetector;
use crate::config::Config;
use crate::content_extractor;
use crate::document::{DocumentKind, DocumentProcessor};
use crate::kernel::{Kernel, LifecycleEvent, LifecycleHook, ScraperStatus};
use crate::metrics::{FailureKind, RunMetrics};
use crate::prioritizer::AdaptivePrioritizer;
use crate::robots::{fetch_robots, ParsedRobots};
use crate::state::PageState;
use crate::storage::{ContentItemRecord, RunMetricsRecord, RunStatus, SqliteStorage, Storage};
use crate::url::{extract_domain, normalize_url, safe_name};
use crate::EngineError;
use reqwest::Client;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use url::Url;

/// Converts an adaptive-prioritizer score into a frontier priority.
///
/// The scheduler's frontier pops the lowest priority value first, while the
/// prioritizer scores URLs so that higher is more interesting. Scaling and
/// inverting keeps the full `u32` range available while letting small score
/// differences still separate into distinct priorities.
fn score_to_priority(score: f64) -> u32 {
    (100_000.0 - (score * 1000.0).round()).max(0.0) as u32
}

/// State shared by every in-flight fetch task, cheap to clone per task.
#[derive(Clone)]
struct TaskContext {
    config: Arc<Config>,
    kernel: Arc<Kernel>,
    storage: Arc<AsyncMutex<SqliteStorage>>,
    scheduler: Arc<AsyncMutex<Scheduler>>,
    http_client: Client,
    retry_policy: RetryPolicy,
    change_detector: Arc<ChangeDetector>,
    document_processor: Arc<DocumentProcessor>,
    prioritizer: Arc<AdaptivePrioritizer>,
    metrics: Arc<RunMetrics>,
    admitted: Arc<AsyncMutex<HashSet<String>>>,
    seed_hosts: Arc<HashSet<String>>,
    run_id: i64,
    output_dir: PathBuf,
    #[cfg(feature = "browser")]
    browser: Option<Arc<crate::browser::BrowserHandler>>,
}

/// Orchestrates a single crawl run end to end.
///
/// The coordinator owns the kernel, the frontier scheduler and storage, and
/// drives the main loop: pull a permitted URL from the scheduler, spawn a
/// task to fetch and process it, and keep going until the frontier is empty
/// and every in-flight task has finished (or the kernel is cancelled).
pub struct Coordinator {
    ctx: TaskContext,
}

impl Coordinator {
    /// Builds a coordinator for `config`, opening (or creating) the
    /// configured database and either resuming an interrupted run or
    /// starting a fresh one.
    ///
    /// `fresh` forces a brand-new run even if an interrupted one is on
    /// record, clearing any saved frontier/domain state first.
    pub fn new(config: Config, config_hash: String, fresh: bool) -> Result<Self, EngineError> {
        let config = Arc::new(config);
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

        let (run_id, resuming) = if fresh {
            storage.clear_frontier()?;
            (storage.create_run(&config_hash)?, false)
        } else {
            match storage.get_latest_run()? {
                Some(run)
                    if matches!(run.status, RunStatus::Running | RunStatus::Interrupted) =>
                {
                    (run.id, true)
                }
                _ => (storage.create_run(&config_hash)?, false),
            }
        };

        let seed_hosts = Arc::new(collect_seed_hosts(&config));

        let (frontier, domain_states) = if resuming {
            let loaded_frontier = storage.load_frontier()?;
            let mut frontier = Vec::with_capacity(loaded_frontier.len());
            for (page_id, priority) in loaded_frontier {
                let page = storage.get_page(page_id)?;
                let depths = storage.get_depths(page_id)?;
                let (quality_origin, depth) = depths
                    .into_iter()
                    .min_by_key(|d| d.depth)
                    .map(|d| (d.quality_origin, d.depth))
                    .unwrap_or_else(|| ("_resumed_".to_string(), 0));
                if let Ok(url) = Url::parse(&page.url) {
                    frontier.push(QueuedUrl {
                        url,
                        domain: page.domain,
                        priority,
                        page_id,
                        depth,
                        quality_origin,
                    });
                }
            }
            (frontier, storage.load_domain_states()?)
        } else {
            let mut frontier = Vec::new();
            for (seed_url, origin) in initial_seeds(&config) {
                let Ok(url) = normalize_url(&seed_url) else {
                    tracing::warn!(seed_url, "skipping malformed seed URL");
                    continue;
                };
                let Some(domain) = extract_domain(&url) else {
                    tracing::warn!(seed_url, "skipping seed URL with no host");
                    continue;
                };
                let page_id = storage.insert_or_get_page(url.as_str(), &domain, run_id)?;
                storage.upsert_depth(page_id, &origin, 0)?;
                storage.add_to_frontier(page_id, 0)?;
                frontier.push(QueuedUrl {
                    url,
                    domain,
                    priority: 0,
                    page_id,
                    depth: 0,
                    quality_origin: origin,
                });
            }
            (frontier, std::collections::HashMap::new())
        };

        let scheduler = Scheduler::new(config.crawler.clone(), frontier, domain_states);

        let http_client = build_http_client_with_timeout(
            &config.user_agent,
            config.crawler.request_timeout_seconds,
        )?;
        let retry_policy = RetryPolicy::default();

        let change_detector = Arc::new(ChangeDetector::new(
            config.change_detection.track_content_versions,
            config.change_detection.max_versions_to_keep,
            config.change_detection.significant_change_threshold,
            config.change_detection.keyword_alert_list.clone(),
            &config.output.output_dir,
        ));
        let document_processor = Arc::new(DocumentProcessor::new(&config.output.output_dir));
        let prioritizer = Arc::new(AdaptivePrioritizer::new());
        let metrics = Arc::new(RunMetrics::new());
        let output_dir = PathBuf::from(&config.output.output_dir);

        let mut kernel = Kernel::new((*config).clone());
        kernel.register::<ChangeDetector>(change_detector.clone());
        kernel.register::<DocumentProcessor>(document_processor.clone());
        kernel.register::<AdaptivePrioritizer>(prioritizer.clone());
        kernel.register::<RunMetrics>(metrics.clone());
        kernel.add_hook(metrics.clone() as Arc<dyn LifecycleHook>);
        kernel.add_hook(change_detector.clone() as Arc<dyn LifecycleHook>);
        let kernel = Arc::new(kernel);

        // Resolve components back out through the registry rather than
        // reusing the local bindings, so the capability lookup the kernel
        // exists for is actually exercised rather than bypassed.
        let change_detector = kernel
            .lookup::<ChangeDetector>()
            .ok_or(EngineError::MissingCapability("change detector"))?;
        let document_processor = kernel
            .lookup::<DocumentProcessor>()
            .ok_or(EngineError::MissingCapability("document processor"))?;
        let prioritizer = kernel
            .lookup::<AdaptivePrioritizer>()
            .ok_or(EngineError::MissingCapability("adaptive prioritizer"))?;
        let metrics = kernel
            .lookup::<RunMetrics>()
            .ok_or(EngineError::MissingCapability("metrics tracker"))?;

        let ctx = TaskContext {
            config,
            kernel,
            storage: Arc::new(AsyncMutex::new(storage)),
            scheduler: Arc::new(AsyncMutex::new(scheduler)),
            http_client,
            retry_policy,
            change_detector,
            document_processor,
            prioritizer,
            metrics,
            admitted: Arc::new(AsyncMutex::new(HashSet::new())),
            seed_hosts,
            run_id,
            output_dir,
            #[cfg(feature = "browser")]
            browser: None,
        };

        Ok(Self { ctx })
    }

    /// Runs the crawl to completion: broadcasts lifecycle events, drains the
    /// frontier through a bounded number of concurrent fetch tasks, then
    /// persists final run status, metrics and a markdown summary.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.ctx.kernel.broadcast(LifecycleEvent::Initialize);
        {
            let mut storage = self.ctx.storage.lock().await;
            storage.save_scraper_state(self.ctx.run_id, ScraperStatus::Initializing)?;
            storage.update_run_status(self.ctx.run_id, RunStatus::Running)?;
        }

        #[cfg(feature = "browser")]
        if self.ctx.config.capabilities.process_js_heavy_pages {
            match crate::browser::BrowserHandler::launch().await {
                Ok(handler) => self.ctx.browser = Some(Arc::new(handler)),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to launch browser handler, falling back to HTTP fetch for this run");
                }
            }
        }

        self.ctx.metrics.start_session();
        self.ctx.kernel.broadcast(LifecycleEvent::Started);
        {
            let mut storage = self.ctx.storage.lock().await;
            storage.save_scraper_state(self.ctx.run_id, ScraperStatus::Running)?;
        }

        let max_pages = self.ctx.config.crawler.max_pages;
        let processed_count = Arc::new(AtomicU64::new(0));
        let mut join_set: JoinSet<()> = JoinSet::new();

        loop {
            if self.ctx.kernel.is_cancelled() {
                break;
            }
            if let Some(max) = max_pages {
                if processed_count.load(Ordering::SeqCst) >= max {
                    break;
                }
            }

            let scheduled = {
                let mut scheduler = self.ctx.scheduler.lock().await;
                scheduler.next_url().await
            };

            let Some(scheduled) = scheduled else {
                if join_set.is_empty() {
                    break;
                }
                join_set.join_next().await;
                continue;
            };

            let ctx = self.ctx.clone();
            let counter = processed_count.clone();
            join_set.spawn(async move {
                process_one(&ctx, scheduled).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        while join_set.join_next().await.is_some() {}
        self.ctx.metrics.stop_session();

        let cancelled = self.ctx.kernel.is_cancelled();
        let run_status = if cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        let scraper_status = if cancelled {
            ScraperStatus::Stopped
        } else {
            ScraperStatus::Completed
        };
        self.ctx.kernel.broadcast(if cancelled {
            LifecycleEvent::Stopped
        } else {
            LifecycleEvent::Completed
        });

        let snapshot = self.ctx.metrics.snapshot();
        {
            let mut storage = self.ctx.storage.lock().await;
            storage.update_run_status(self.ctx.run_id, run_status)?;
            if run_status == RunStatus::Completed {
                storage.complete_run(self.ctx.run_id)?;
            }
            storage.save_scraper_state(self.ctx.run_id, scraper_status)?;
            storage.save_run_metrics(
                self.ctx.run_id,
                &RunMetricsRecord {
                    processed_urls: snapshot.processed_urls,
                    successful_urls: snapshot.successful_urls,
                    client_errors: snapshot.client_errors,
                    server_errors: snapshot.server_errors,
                    timeouts: snapshot.timeouts,
                    network_errors: snapshot.network_errors,
                    rate_limited: snapshot.rate_limited,
                    bytes_fetched: snapshot.bytes_fetched,
                    documents_processed: snapshot.documents_processed,
                    session_elapsed_ms: snapshot.session_elapsed_ms,
                },
            )?;
            let domain_states = self.ctx.scheduler.lock().await.get_all_domain_states().clone();
            storage.save_domain_states(&domain_states)?;
        }

        if let Err(e) = self.ctx.change_detector.save_version_history() {
            tracing::warn!(error = %e, "failed to persist version history");
        }

        {
            let storage = self.ctx.storage.lock().await;
            match crate::output::generate_summary(&*storage) {
                Ok(summary) => {
                    if let Err(e) = crate::output::generate_markdown_summary(
                        &summary,
                        Path::new(&self.ctx.config.output.summary_path),
                    ) {
                        tracing::warn!(error = %e, "failed to write markdown summary");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to generate crawl summary"),
            }
        }

        Ok(())
    }
}

/// Hosts named by the configuration's seeds: every quality-domain seed and
/// every ad-hoc scope start URL. Used as the scope fallback when
/// `scope.allowed-domains` is left empty.
fn collect_seed_hosts(config: &Config) -> HashSet<String> {
    let mut hosts = HashSet::new();
    for entry in &config.quality {
        hosts.insert(entry.domain.to_lowercase());
        for seed in &entry.seeds {
            if let Ok(url) = normalize_url(seed) {
                if let Some(host) = extract_domain(&url) {
                    hosts.insert(host);
                }
            }
        }
    }
    for seed in &config.scope.start_urls {
        if let Ok(url) = normalize_url(seed) {
            if let Some(host) = extract_domain(&url) {
                hosts.insert(host);
            }
        }
    }
    hosts
}

/// Every configured seed URL paired with the quality-origin name its depth
/// should be measured from: a quality entry's domain for its own seeds, or
/// the seed URL itself for an ad-hoc scope start URL.
fn initial_seeds(config: &Config) -> Vec<(String, String)> {
    let mut seeds = Vec::new();
    for entry in &config.quality {
        for seed in &entry.seeds {
            seeds.push((seed.clone(), entry.domain.clone()));
        }
    }
    for seed in &config.scope.start_urls {
        seeds.push((seed.clone(), seed.clone()));
    }
    seeds
}

/// Fetches, processes and records one scheduled URL, then runs every link it
/// contains through admission control and re-enqueues whatever survives.
async fn process_one(ctx: &TaskContext, scheduled: super::scheduler::ScheduledFetch) {
    let queued = scheduled.url;
    {
        let mut scheduler = ctx.scheduler.lock().await;
        scheduler.record_request(&queued.domain);
    }
    ctx.metrics.start_url_request(&queued.domain);

    if let Err(e) = {
        let mut storage = ctx.storage.lock().await;
        storage.update_page_state(queued.page_id, PageState::Fetching, None, None, None, None)
    } {
        tracing::warn!(url = %queued.url, error = %e, "failed to mark page as fetching");
    }

    if ctx.config.crawler.respect_robots_txt {
        if !robots_allow(ctx, &queued).await {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Other);
            let mut storage = ctx.storage.lock().await;
            if let Err(e) = storage.update_page_state(
                queued.page_id,
                PageState::Failed,
                None,
                None,
                None,
                Some("disallowed by robots.txt"),
            ) {
                tracing::warn!(url = %queued.url, error = %e, "failed to mark page as robots-disallowed");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
            return;
        }
    }

    #[cfg(feature = "browser")]
    if let Some(browser) = ctx.browser.clone() {
        let nav = browser.navigate_to_url(queued.url.as_str()).await;
        if nav.success {
            ctx.metrics.complete_url_request(
                &queued.domain,
                nav.status.unwrap_or(200),
                nav.html.len() as u64,
            );
            handle_success(ctx, &queued, queued.url.as_str(), nav.status.unwrap_or(200), "text/html", nav.html).await;
        } else {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Network);
            let mut storage = ctx.storage.lock().await;
            if let Err(e) = storage.update_page_state(
                queued.page_id,
                PageState::Failed,
                None,
                None,
                None,
                nav.error.as_deref(),
            ) {
                tracing::warn!(url = %queued.url, error = %e, "failed to mark page as failed after browser navigation error");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
        }
        return;
    }

    let result = fetch_url_with_retry(&ctx.http_client, queued.url.as_str(), &ctx.retry_policy).await;

    match result {
        FetchResult::Success {
            final_url,
            status_code,
            content_type,
            body,
            ..
        } => {
            ctx.metrics
                .complete_url_request(&queued.domain, status_code, body.len() as u64);
            handle_success(ctx, &queued, &final_url, status_code, &content_type, body).await;
        }
        FetchResult::ContentMismatch { content_type } => {
            handle_content_mismatch(ctx, &queued, &content_type).await;
        }
        FetchResult::RedirectToTerminal { terminal_url, reason } => {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Other);
            let mut storage = ctx.storage.lock().await;
            let message = format!("redirected to terminal domain {terminal_url}: {reason}");
            if let Err(e) =
                storage.update_page_state(queued.page_id, PageState::Rejected, None, None, None, Some(&message))
            {
                tracing::warn!(url = %queued.url, error = %e, "failed to mark page as rejected after terminal redirect");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
        }
        FetchResult::HttpError { status_code, state } => {
            ctx.metrics.complete_url_request(&queued.domain, status_code, 0);
            let mut storage = ctx.storage.lock().await;
            if let Err(e) = storage.update_page_state(
                queued.page_id,
                state,
                None,
                Some(status_code),
                None,
                Some("http error response"),
            ) {
                tracing::warn!(url = %queued.url, error = %e, "failed to record http error response");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
            ctx.prioritizer.record_outcome(queued.url.as_str(), false, false);
        }
        FetchResult::NetworkError { error, state } => {
            let kind = if error.to_lowercase().contains("timeout") {
                FailureKind::Timeout
            } else {
                FailureKind::Network
            };
            ctx.metrics.record_failed_request(&queued.domain, kind);
            let mut storage = ctx.storage.lock().await;
            if let Err(e) = storage.update_page_state(queued.page_id, state, None, None, None, Some(&error)) {
                tracing::warn!(url = %queued.url, error = %e, "failed to record network error");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
            ctx.prioritizer.record_outcome(queued.url.as_str(), false, false);
        }
        FetchResult::RedirectError { error } => {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Other);
            let mut storage = ctx.storage.lock().await;
            if let Err(e) = storage.update_page_state(
                queued.page_id,
                PageState::Failed,
                None,
                None,
                None,
                Some(&error),
            ) {
                tracing::warn!(url = %queued.url, error = %e, "failed to mark page as failed after redirect error");
                ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
            }
        }
    }
}

/// Checks (and, if stale, refreshes) the domain's cached robots.txt, then
/// evaluates whether this URL's path is allowed for the configured agent.
async fn robots_allow(ctx: &TaskContext, queued: &QueuedUrl) -> bool {
    let agent = user_agent_string(&ctx.config.user_agent);

    let needs_fetch = {
        let scheduler = ctx.scheduler.lock().await;
        scheduler
            .get_domain_state(&queued.domain)
            .map(|state| state.robots_txt.is_none() || state.is_robots_stale())
            .unwrap_or(true)
    };

    if needs_fetch {
        match fetch_robots(&queued.domain, &agent).await {
            Ok(robots) => {
                let mut scheduler = ctx.scheduler.lock().await;
                scheduler
                    .ensure_domain_state(&queued.domain)
                    .update_robots(robots.content().to_string());
            }
            Err(e) => {
                tracing::debug!(domain = %queued.domain, error = %e, "robots.txt fetch failed, allowing");
                return true;
            }
        }
    }

    let scheduler = ctx.scheduler.lock().await;
    match scheduler
        .get_domain_state(&queued.domain)
        .and_then(|state| state.robots_txt.as_ref())
    {
        Some(cached) => ParsedRobots::from_content(&cached.content).is_allowed(queued.url.path(), &agent),
        None => true,
    }
}

/// Handles a successfully fetched HTML page: extracts text, persists it,
/// writes the per-URL artifacts, tracks its version, and admits its links.
async fn handle_success(
    ctx: &TaskContext,
    queued: &QueuedUrl,
    final_url: &str,
    status_code: u16,
    content_type: &str,
    body: String,
) {
    let text = content_extractor::extract_text(&body);
    let (title, links) = match parse_html(&body, &queued.url) {
        Ok(parsed) => (parsed.title, parsed.links),
        Err(e) => {
            tracing::warn!(url = final_url, error = %e, "failed to parse page");
            (None, Vec::new())
        }
    };

    let version = ctx.change_detector.track_page_version(final_url, body.as_bytes(), &text);

    if let Err(e) = write_page_artifacts(&ctx.output_dir, final_url, &body, &text, &title) {
        tracing::warn!(url = final_url, error = %e, "failed to write page artifacts");
    }

    {
        let mut storage = ctx.storage.lock().await;
        if let Err(e) = storage.save_content(&ContentItemRecord {
            url: final_url.to_string(),
            run_id: ctx.run_id,
            content_type: "text/plain".to_string(),
            text_content: Some(text.clone()),
            content_hash: version.content_hash.clone(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }) {
            tracing::warn!(url = final_url, error = %e, "failed to save page content");
            ctx.kernel.add_error(final_url, &e.to_string());
        }
        if let Err(e) = storage.update_page_state(
            queued.page_id,
            PageState::Processed,
            title.as_deref(),
            Some(status_code),
            Some(content_type),
            None,
        ) {
            tracing::warn!(url = final_url, error = %e, "failed to mark page as processed");
            ctx.kernel.add_error(final_url, &e.to_string());
        }
    }

    ctx.prioritizer.record_outcome(final_url, true, true);

    if ctx.config.change_detection.notify_on_changes {
        if let Some(report) = ctx.change_detector.significant_change_report(final_url) {
            if report.is_significant || report.is_critical {
                tracing::warn!(
                    url = final_url,
                    is_critical = report.is_critical,
                    summary = %report.summary,
                    "significant content change detected"
                );
            }
        }
    }

    for link in links {
        admit_and_enqueue(ctx, queued, final_url, &link).await;
    }
}

/// Runs a single discovered link through admission control and, if it
/// survives, registers it in storage and pushes it onto the scheduler.
async fn admit_and_enqueue(ctx: &TaskContext, queued: &QueuedUrl, referrer: &str, link: &str) {
    let admission = {
        let mut admitted = ctx.admitted.lock().await;
        let storage = ctx.storage.lock().await;
        admit(
            link,
            &ctx.config,
            &ctx.seed_hosts,
            &mut admitted,
            &*storage,
            ctx.run_id,
        )
    };

    match admission {
        Admission::Admitted { normalized, domain } => {
            let child_depth = queued.depth + 1;
            let priority = score_to_priority(ctx.prioritizer.score(normalized.as_str()));

            let mut storage = ctx.storage.lock().await;
            let page_id = match storage.insert_or_get_page(normalized.as_str(), &domain, ctx.run_id) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(url = normalized.as_str(), error = %e, "failed to insert discovered page");
                    return;
                }
            };
            if let Err(e) = storage.insert_link(queued.page_id, page_id, ctx.run_id) {
                tracing::warn!(url = normalized.as_str(), error = %e, "failed to record discovered link");
                ctx.kernel.add_error(normalized.as_str(), &e.to_string());
            }
            if let Err(e) = storage.upsert_depth(page_id, &queued.quality_origin, child_depth) {
                tracing::warn!(url = normalized.as_str(), error = %e, "failed to record page depth");
                ctx.kernel.add_error(normalized.as_str(), &e.to_string());
            }

            let should_crawl = storage
                .should_crawl(page_id, ctx.config.crawler.max_depth)
                .unwrap_or(false);
            if !should_crawl {
                if let Err(e) =
                    storage.update_page_state(page_id, PageState::DepthExceeded, None, None, None, None)
                {
                    tracing::warn!(url = normalized.as_str(), error = %e, "failed to mark page as depth-exceeded");
                    ctx.kernel.add_error(normalized.as_str(), &e.to_string());
                }
                return;
            }
            if let Err(e) = storage.add_to_frontier(page_id, priority) {
                tracing::warn!(url = normalized.as_str(), error = %e, "failed to add page to frontier");
                ctx.kernel.add_error(normalized.as_str(), &e.to_string());
            }
            drop(storage);

            let mut scheduler = ctx.scheduler.lock().await;
            scheduler.add_to_frontier(QueuedUrl {
                url: normalized,
                domain,
                priority,
                page_id,
                depth: child_depth,
                quality_origin: queued.quality_origin.clone(),
            });
        }
        Admission::Rejected { state, .. } => {
            let mut storage = ctx.storage.lock().await;
            match state {
                PageState::Blacklisted => {
                    if let Err(e) = storage.record_blacklisted(link, referrer, ctx.run_id) {
                        tracing::warn!(url = link, error = %e, "failed to record blacklisted link");
                        ctx.kernel.add_error(link, &e.to_string());
                    }
                }
                PageState::Stubbed => {
                    if let Err(e) = storage.record_stubbed(link, referrer, ctx.run_id) {
                        tracing::warn!(url = link, error = %e, "failed to record stubbed link");
                        ctx.kernel.add_error(link, &e.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

/// Handles a non-HTML response: if it is a supported document kind and the
/// matching capability is enabled, fetches the raw bytes separately (the
/// HEAD-then-GET fetch path never captures a body for a content mismatch)
/// and runs it through the document processor; otherwise records the page
/// as a content mismatch.
async fn handle_content_mismatch(ctx: &TaskContext, queued: &QueuedUrl, content_type: &str) {
    let kind = DocumentKind::classify(content_type, queued.url.as_str());
    let supported = match kind {
        DocumentKind::Pdf => ctx.config.capabilities.process_pdf_documents,
        DocumentKind::WordProcessing | DocumentKind::Spreadsheet | DocumentKind::Presentation => {
            ctx.config.capabilities.process_office_documents
        }
        DocumentKind::OpenDocument | DocumentKind::Unknown => false,
    };

    if !supported {
        ctx.metrics.complete_url_request(&queued.domain, 200, 0);
        let mut storage = ctx.storage.lock().await;
        if let Err(e) = storage.update_page_state(
            queued.page_id,
            PageState::ContentMismatch,
            None,
            None,
            Some(content_type),
            None,
        ) {
            tracing::warn!(url = queued.url.as_str(), error = %e, "failed to mark page as content mismatch");
            ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
        }
        return;
    }

    let response = match ctx.http_client.get(queued.url.as_str()).send().await {
        Ok(resp) => resp,
        Err(e) => {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Network);
            let mut storage = ctx.storage.lock().await;
            if let Err(storage_err) = storage.update_page_state(
                queued.page_id,
                PageState::Unreachable,
                None,
                None,
                None,
                Some(&e.to_string()),
            ) {
                tracing::warn!(url = queued.url.as_str(), error = %storage_err, "failed to mark page as unreachable");
                ctx.kernel.add_error(queued.url.as_str(), &storage_err.to_string());
            }
            return;
        }
    };
    let status = response.status().as_u16();
    let raw = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            ctx.metrics.record_failed_request(&queued.domain, FailureKind::Network);
            let mut storage = ctx.storage.lock().await;
            if let Err(storage_err) = storage.update_page_state(
                queued.page_id,
                PageState::Failed,
                None,
                Some(status),
                None,
                Some(&e.to_string()),
            ) {
                tracing::warn!(url = queued.url.as_str(), error = %storage_err, "failed to mark page as failed after body read error");
                ctx.kernel.add_error(queued.url.as_str(), &storage_err.to_string());
            }
            return;
        }
    };

    ctx.metrics.complete_url_request(&queued.domain, status, raw.len() as u64);

    let processed = match ctx
        .document_processor
        .process_document(queued.url.as_str(), content_type, &raw)
    {
        Ok(processed) => processed,
        Err(e) => {
            let mut storage = ctx.storage.lock().await;
            if let Err(storage_err) = storage.update_page_state(
                queued.page_id,
                PageState::Failed,
                None,
                Some(status),
                Some(content_type),
                Some(&e.to_string()),
            ) {
                tracing::warn!(url = queued.url.as_str(), error = %storage_err, "failed to mark page as failed after document processing error");
                ctx.kernel.add_error(queued.url.as_str(), &storage_err.to_string());
            }
            return;
        }
    };

    ctx.metrics.record_document_processed();
    let version = ctx
        .change_detector
        .track_page_version(queued.url.as_str(), &raw, processed.extracted_text.as_deref().unwrap_or(""));

    let mut storage = ctx.storage.lock().await;
    if let Some(text) = &processed.extracted_text {
        if let Err(e) = storage.save_content(&ContentItemRecord {
            url: queued.url.as_str().to_string(),
            run_id: ctx.run_id,
            content_type: "text/plain".to_string(),
            text_content: Some(text.clone()),
            content_hash: version.content_hash.clone(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }) {
            tracing::warn!(url = queued.url.as_str(), error = %e, "failed to save extracted document content");
            ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
        }
    }
    if let Err(e) = storage.update_page_state(
        queued.page_id,
        PageState::Processed,
        processed.metadata.title.as_deref(),
        Some(status),
        Some(content_type),
        None,
    ) {
        tracing::warn!(url = queued.url.as_str(), error = %e, "failed to mark document page as processed");
        ctx.kernel.add_error(queued.url.as_str(), &e.to_string());
    }
}

/// Writes `<safe-name>.html`, `.txt` and `.meta.json` artifacts for a
/// successfully fetched page under the configured output directory.
fn write_page_artifacts(
    output_dir: &Path,
    url: &str,
    body: &str,
    text: &str,
    title: &Option<String>,
) -> std::io::Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let base = safe_name(url);
    std::fs::write(output_dir.join(format!("{base}.html")), body)?;
    std::fs::write(output_dir.join(format!("{base}.txt")), text)?;
    let meta = serde_json::json!({
        "url": url,
        "title": title,
    });
    std::fs::write(
        output_dir.join(format!("{base}.meta.json")),
        serde_json::to_string_pretty(&meta).unwrap_or_default(),
    )?;
    Ok(())
}

/// Runs the main crawl operation for `config`, using `config_hash` to tag
/// the resulting run and `fresh` to decide whether to resume an interrupted
/// run or start over.
pub async fn run_crawl(config: Config, config_hash: String, fresh: bool) -> Result<(), EngineError> {
    let mut coordinator = Coordinator::new(config, config_hash, fresh)?;
    coordinator.run().await
}
