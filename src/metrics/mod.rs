//! Metrics aggregator: per-run counters plus per-domain sub-counters.
//!
//! Global counters are plain atomics so the hot path never takes a lock;
//! per-domain breakdowns are comparatively rare to update and read, so they
//! sit behind a single mutex-guarded map, mirroring the scheduler's
//! domain-state map.

use crate::kernel::{LifecycleEvent, LifecycleHook};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Why a fetch failed without producing an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Network,
    Other,
}

/// Per-domain counters. Cloned out of the lock for snapshotting.
#[derive(Debug, Clone, Default)]
pub struct DomainMetrics {
    pub requests: u64,
    pub successful: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub rate_limited: u64,
    pub bytes: u64,
}

/// Point-in-time snapshot suitable for persisting to the `run_metrics` table.
#[derive(Debug, Clone, Default)]
pub struct RunMetricsSnapshot {
    pub processed_urls: u64,
    pub successful_urls: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub timeouts: u64,
    pub network_errors: u64,
    pub rate_limited: u64,
    pub bytes_fetched: u64,
    pub documents_processed: u64,
    pub pending_requests: i64,
    pub session_elapsed_ms: Option<u64>,
    pub domains: HashMap<String, DomainMetrics>,
}

pub struct RunMetrics {
    processed: AtomicU64,
    successful: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    timeouts: AtomicU64,
    network_errors: AtomicU64,
    rate_limited: AtomicU64,
    bytes: AtomicU64,
    documents: AtomicU64,
    pending: AtomicI64,
    domains: Mutex<HashMap<String, DomainMetrics>>,
    session: Mutex<SessionTiming>,
}

#[derive(Default)]
struct SessionTiming {
    started_at: Option<Instant>,
    elapsed: Option<std::time::Duration>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            processed: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            server_errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            documents: AtomicU64::new(0),
            pending: AtomicI64::new(0),
            domains: Mutex::new(HashMap::new()),
            session: Mutex::new(SessionTiming::default()),
        }
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts session timing; idempotent if already started.
    pub fn start_session(&self) {
        let mut session = self.session.lock().expect("metrics mutex poisoned");
        if session.started_at.is_none() {
            session.started_at = Some(Instant::now());
        }
    }

    /// Stops session timing and freezes the elapsed duration.
    pub fn stop_session(&self) {
        let mut session = self.session.lock().expect("metrics mutex poisoned");
        if let Some(started_at) = session.started_at {
            session.elapsed = Some(started_at.elapsed());
        }
    }

    /// Call immediately before issuing a fetch. Bumps pending in-flight count
    /// and the domain's request count.
    pub fn start_url_request(&self, domain: &str) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let mut domains = self.domains.lock().expect("metrics mutex poisoned");
        domains.entry(domain.to_string()).or_default().requests += 1;
    }

    /// Call when a fetch returns an HTTP status. Debits pending and buckets
    /// the outcome by status class.
    pub fn complete_url_request(&self, domain: &str, status: u16, bytes: u64) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(bytes, Ordering::SeqCst);

        let mut domains = self.domains.lock().expect("metrics mutex poisoned");
        let entry = domains.entry(domain.to_string()).or_default();
        entry.bytes += bytes;

        match status {
            200..=299 => {
                self.successful.fetch_add(1, Ordering::SeqCst);
                entry.successful += 1;
            }
            429 => {
                self.rate_limited.fetch_add(1, Ordering::SeqCst);
                entry.rate_limited += 1;
            }
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::SeqCst);
                entry.client_errors += 1;
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::SeqCst);
                entry.server_errors += 1;
            }
            _ => {}
        }
    }

    /// Call when a fetch fails without producing a status code.
    pub fn record_failed_request(&self, domain: &str, kind: FailureKind) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
        match kind {
            FailureKind::Timeout => {
                self.timeouts.fetch_add(1, Ordering::SeqCst);
            }
            FailureKind::Network => {
                self.network_errors.fetch_add(1, Ordering::SeqCst);
            }
            FailureKind::Other => {
                self.server_errors.fetch_add(1, Ordering::SeqCst);
            }
        }
        let mut domains = self.domains.lock().expect("metrics mutex poisoned");
        domains.entry(domain.to_string()).or_default();
    }

    pub fn record_document_processed(&self) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending_requests(&self) -> i64 {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        let session = self.session.lock().expect("metrics mutex poisoned");
        let session_elapsed_ms = session
            .elapsed
            .or_else(|| session.started_at.map(|s| s.elapsed()))
            .map(|d| d.as_millis() as u64);

        RunMetricsSnapshot {
            processed_urls: self.processed.load(Ordering::SeqCst),
            successful_urls: self.successful.load(Ordering::SeqCst),
            client_errors: self.client_errors.load(Ordering::SeqCst),
            server_errors: self.server_errors.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
            network_errors: self.network_errors.load(Ordering::SeqCst),
            rate_limited: self.rate_limited.load(Ordering::SeqCst),
            bytes_fetched: self.bytes.load(Ordering::SeqCst),
            documents_processed: self.documents.load(Ordering::SeqCst),
            pending_requests: self.pending.load(Ordering::SeqCst),
            session_elapsed_ms,
            domains: self.domains.lock().expect("metrics mutex poisoned").clone(),
        }
    }
}

impl LifecycleHook for RunMetrics {
    fn component_name(&self) -> &'static str {
        "metrics_tracker"
    }

    fn on_event(&self, event: LifecycleEvent) -> Result<(), String> {
        match event {
            LifecycleEvent::Started => self.start_session(),
            LifecycleEvent::Completed | LifecycleEvent::Stopped => self.stop_session(),
            LifecycleEvent::Initialize => {}
        }
        Ok(())
    }
}
