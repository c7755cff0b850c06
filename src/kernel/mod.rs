//! Kernel: owns configuration, the typed capability registry, lifecycle
//! broadcast, the cancellation signal and the bounded error log.
//!
//! Components never hold a strong reference to one another; they reach each
//! other exclusively through [`Kernel::lookup`]. This breaks the cycles that
//! a direct processor-to-state-manager-to-adapter reference chain would
//! otherwise create.

mod lifecycle;
mod registry;

pub use lifecycle::{LifecycleEvent, LifecycleHook};
pub use registry::Registry;

use crate::config::Config;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span};

const MAX_ERROR_LOG: usize = 200;

/// Terminal or in-progress status of a scraper run (mirrors the
/// Initializing/Running/Completed/Stopped/Failed states a `ScraperState`
/// row tracks across its lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperStatus {
    Initializing,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl ScraperStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "initializing" => Some(Self::Initializing),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The kernel. Cheap to clone (everything inside is `Arc`/`Mutex`), so a
/// `Kernel` handle can be cloned into every spawned task.
pub struct Kernel {
    config: Arc<Config>,
    registry: Registry,
    hooks: Vec<Arc<dyn LifecycleHook>>,
    cancellation: CancellationToken,
    errors: Mutex<VecDeque<(String, String)>>,
}

impl Kernel {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: Registry::new(),
            hooks: Vec::new(),
            cancellation: CancellationToken::new(),
            errors: Mutex::new(VecDeque::with_capacity(MAX_ERROR_LOG)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_arc(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Registers `component` as the advertiser of capability `C`. Call
    /// before [`Kernel::start`]; components registered afterward are not
    /// included in the lifecycle broadcast.
    pub fn register<C: ?Sized + 'static>(&mut self, component: Arc<C>)
    where
        Arc<C>: Send + Sync + 'static,
    {
        self.registry.register::<C>(component);
    }

    /// Resolves the component advertising capability `C`, or `None` if no
    /// component registered it.
    pub fn lookup<C: ?Sized + 'static>(&self) -> Option<Arc<C>>
    where
        Arc<C>: Clone + Send + Sync + 'static,
    {
        self.registry.get::<C>()
    }

    /// Adds a lifecycle participant; hooks fire in the order they were added.
    pub fn add_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Records an error against the run. Bounded ring of the last
    /// `MAX_ERROR_LOG` entries; oldest are dropped silently.
    pub fn add_error(&self, url: &str, message: &str) {
        error!(url, message, "crawl error recorded");
        let mut errors = self.errors.lock().expect("error log mutex poisoned");
        if errors.len() >= MAX_ERROR_LOG {
            errors.pop_front();
        }
        errors.push_back((url.to_string(), message.to_string()));
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors
            .lock()
            .expect("error log mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Broadcasts `event` to every registered hook, serially, in
    /// registration order. A hook's failure is logged and returned to the
    /// caller keyed by component name; it never stops the broadcast for the
    /// remaining hooks.
    pub fn broadcast(&self, event: LifecycleEvent) -> Vec<(&'static str, String)> {
        let mut failures = Vec::new();
        for hook in &self.hooks {
            let span = info_span!("lifecycle", component = hook.component_name(), %event);
            let _guard = span.enter();
            if let Err(message) = hook.on_event(event) {
                error!(component = hook.component_name(), %event, %message, "lifecycle hook failed");
                failures.push((hook.component_name(), message));
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CapabilitiesConfig, ChangeDetectionConfig, Config, CrawlerConfig, OutputConfig,
        PersistenceConfig, ScopeConfig, ScraperIdentity, UserAgentConfig,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> Config {
        Config {
            scraper: ScraperIdentity::default(),
            crawler: CrawlerConfig {
                max_depth: 1,
                max_pages: None,
                max_concurrent_requests: 4,
                min_delay_ms: 0,
                max_delay_ms: 1000,
                max_domain_requests: 100,
                request_timeout_seconds: 30,
                respect_robots_txt: true,
                revisit: false,
            },
            user_agent: UserAgentConfig {
                crawler_name: "test".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com".to_string(),
                contact_email: "a@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
                summary_path: "./summary.md".to_string(),
                output_dir: "./output".to_string(),
            },
            scope: ScopeConfig::default(),
            change_detection: ChangeDetectionConfig::default(),
            persistence: PersistenceConfig::default(),
            capabilities: CapabilitiesConfig::default(),
            quality: vec![],
            blacklist: vec![],
            stub: vec![],
        }
    }

    struct RecordingHook {
        name: &'static str,
        seen: Arc<Mutex<Vec<(&'static str, LifecycleEvent)>>>,
        fail_on: Option<LifecycleEvent>,
    }

    impl LifecycleHook for RecordingHook {
        fn component_name(&self) -> &'static str {
            self.name
        }

        fn on_event(&self, event: LifecycleEvent) -> Result<(), String> {
            self.seen.lock().unwrap().push((self.name, event));
            if self.fail_on == Some(event) {
                return Err("boom".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn broadcast_fires_in_registration_order() {
        let mut kernel = Kernel::new(test_config());
        let seen = Arc::new(Mutex::new(Vec::new()));

        kernel.add_hook(Arc::new(RecordingHook {
            name: "a",
            seen: seen.clone(),
            fail_on: None,
        }));
        kernel.add_hook(Arc::new(RecordingHook {
            name: "b",
            seen: seen.clone(),
            fail_on: None,
        }));

        let failures = kernel.broadcast(LifecycleEvent::Initialize);
        assert!(failures.is_empty());

        let recorded = seen.lock().unwrap();
        assert_eq!(
            *recorded,
            vec![
                ("a", LifecycleEvent::Initialize),
                ("b", LifecycleEvent::Initialize)
            ]
        );
    }

    #[test]
    fn a_failing_hook_does_not_block_its_siblings() {
        let mut kernel = Kernel::new(test_config());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sibling_ran = Arc::new(AtomicUsize::new(0));

        kernel.add_hook(Arc::new(RecordingHook {
            name: "failing",
            seen: seen.clone(),
            fail_on: Some(LifecycleEvent::Initialize),
        }));

        struct CountingHook(Arc<AtomicUsize>);
        impl LifecycleHook for CountingHook {
            fn component_name(&self) -> &'static str {
                "counting"
            }
            fn on_event(&self, _event: LifecycleEvent) -> Result<(), String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
        kernel.add_hook(Arc::new(CountingHook(sibling_ran.clone())));

        let failures = kernel.broadcast(LifecycleEvent::Initialize);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "failing");
        assert_eq!(sibling_ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_log_is_bounded() {
        let kernel = Kernel::new(test_config());
        for i in 0..(MAX_ERROR_LOG + 10) {
            kernel.add_error(&format!("http://x.test/{i}"), "failed");
        }
        assert_eq!(kernel.errors().len(), MAX_ERROR_LOG);
    }

    #[test]
    fn cancellation_token_reflects_cancel() {
        let kernel = Kernel::new(test_config());
        assert!(!kernel.is_cancelled());
        kernel.cancel();
        assert!(kernel.is_cancelled());
    }

    trait Echo: Send + Sync {
        fn echo(&self) -> &'static str;
    }
    struct EchoImpl;
    impl Echo for EchoImpl {
        fn echo(&self) -> &'static str {
            "ok"
        }
    }

    #[test]
    fn scraper_status_db_string_roundtrip() {
        for status in [
            ScraperStatus::Initializing,
            ScraperStatus::Running,
            ScraperStatus::Completed,
            ScraperStatus::Stopped,
            ScraperStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            assert_eq!(ScraperStatus::from_db_string(db_str), Some(status));
        }
    }

    #[test]
    fn register_and_lookup_roundtrip() {
        let mut kernel = Kernel::new(test_config());
        kernel.register::<dyn Echo>(Arc::new(EchoImpl));
        assert_eq!(kernel.lookup::<dyn Echo>().unwrap().echo(), "ok");
    }
}
