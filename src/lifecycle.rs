//! App lifecycle capability: foreground/background state and transitions.
//!
//! Mirrors the three states a mobile OS reports for an app. The coordinator
//! only ever asks one question, "are we foregrounded right now?", but the
//! full state is kept so transition logging stays faithful.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Current foreground/background status of the host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    /// App is visible and receiving input.
    #[default]
    Active,

    /// App is transitioning (e.g. incoming call overlay, app switcher).
    Inactive,

    /// App is fully backgrounded.
    Background,
}

impl AppLifecycle {
    /// Whether polling ticks should perform network calls in this state.
    pub fn is_foreground(&self) -> bool {
        matches!(self, AppLifecycle::Active)
    }
}

/// Writer side of the lifecycle state. The host application (or an OS
/// bridge) owns this and reports transitions; the coordinator subscribes.
#[derive(Debug, Clone)]
pub struct LifecycleHandle {
    tx: watch::Sender<AppLifecycle>,
}

impl LifecycleHandle {
    /// Create a handle starting in the `Active` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AppLifecycle::Active);
        Self { tx }
    }

    /// Report a lifecycle transition.
    pub fn set(&self, state: AppLifecycle) {
        self.tx.send_replace(state);
    }

    /// The current lifecycle state.
    pub fn current(&self) -> AppLifecycle {
        *self.tx.borrow()
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe(&self) -> watch::Receiver<AppLifecycle> {
        self.tx.subscribe()
    }
}

impl Default for LifecycleHandle {
    fn default() -> Self {
        Self::new()
    }
}
