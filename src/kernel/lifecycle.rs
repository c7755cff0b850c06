//! Lifecycle broadcast.
//!
//! Components that care about run lifecycle implement [`LifecycleHook`] and
//! are registered with the kernel in the order they should be notified.
//! Broadcasts are synchronous and serial: a handler for component A
//! completes before the handler for component B begins.

use std::fmt;

/// A single lifecycle edge fired by the kernel during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Fired once per component, in registration order, before the run starts.
    Initialize,
    /// Fired once, after every component has initialized successfully.
    Started,
    /// Fired once the run has drained without cancellation.
    Completed,
    /// Fired once if the run was cancelled before draining.
    Stopped,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialize => "initialize",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Implemented by components that need to react to lifecycle edges.
///
/// `on_event` must not panic; an `Err` is logged and collected by
/// [`crate::kernel::Kernel::broadcast`] rather than aborting the broadcast
/// for its siblings.
pub trait LifecycleHook: Send + Sync {
    /// Name used in tracing spans so a run's log stream can be correlated
    /// end to end across components.
    fn component_name(&self) -> &'static str;

    fn on_event(&self, event: LifecycleEvent) -> Result<(), String>;
}
