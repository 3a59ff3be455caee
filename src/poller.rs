//! The notification polling coordinator.
//!
//! Owns the periodic unread-notification fetch for one signed-in session:
//! it polls a [`NotificationSource`] on a fixed interval, keeps an in-memory
//! view (unread count, recent notifications, pending toast), suppresses
//! duplicate or stale toast presentations, and stops itself after repeated
//! backend failures.
//!
//! # Lifecycle
//!
//! - Login starts the loop; logout stops it and clears every state field.
//! - Ticks while the app is backgrounded skip the network call; no backlog
//!   accumulates.
//! - After [`PollerConfig::failure_threshold`] consecutive failed fetches
//!   the loop stops. A foreground transition, an explicit [`refresh`], or a
//!   re-login resumes it.
//!
//! # Toast policy
//!
//! Only the newest entry of a fetch is considered. It is surfaced as a
//! toast when its id is above everything seen so far, it has not been shown
//! before, and it is younger than [`PollerConfig::recency_window`]. The
//! last rule keeps a backlog of old notifications from producing a toast
//! storm right after login.
//!
//! [`refresh`]: NotificationPoller::refresh

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::NotificationSource;
use crate::lifecycle::AppLifecycle;
use crate::model::{Notification, UnreadPage};
use crate::session::UserIdentity;

/// Tunable parameters of the polling loop.
///
/// The defaults match the behavior of the mobile app. They are fields
/// rather than constants so hosts (and tests) can tighten or relax them.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between scheduled fetches.
    pub poll_interval: Duration,

    /// Page size requested from the backend.
    pub page_limit: u32,

    /// Maximum notifications retained for display.
    pub max_stored: usize,

    /// A notification older than this is never surfaced as a toast.
    pub recency_window: Duration,

    /// Consecutive failed fetches after which the loop stops itself.
    pub failure_threshold: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            page_limit: 10,
            max_stored: 20,
            recency_window: Duration::from_secs(60),
            failure_threshold: 5,
        }
    }
}

/// Read-only snapshot of the coordinator state, for UI consumers.
#[derive(Debug, Clone, Default)]
pub struct PollerView {
    /// Latest server-reported count of unread notifications.
    pub unread_count: u64,

    /// Most recent notifications, newest-first, capped at
    /// [`PollerConfig::max_stored`].
    pub recent_notifications: Vec<Notification>,

    /// A notification waiting to be surfaced as a toast, if any.
    pub pending_toast: Option<Notification>,

    /// Whether the periodic fetch loop is currently active.
    pub is_polling: bool,
}

/// Internal mutable state. One instance per coordinator; every field except
/// `user` and `epoch` is zeroed on logout.
#[derive(Debug, Default)]
struct PollState {
    /// Bumped on every logout reset so an in-flight fetch started under an
    /// earlier session discards its result.
    epoch: u64,
    user: Option<UserIdentity>,
    lifecycle: AppLifecycle,
    unread_count: u64,
    recent: Vec<Notification>,
    pending_toast: Option<Notification>,
    is_polling: bool,
    /// Highest notification id ever observed this session. Never decreases.
    last_seen_id: i64,
    /// Ids already surfaced as a toast this session.
    shown_ids: HashSet<i64>,
    consecutive_failures: u32,
}

impl PollState {
    fn reset(&mut self) {
        self.epoch += 1;
        self.unread_count = 0;
        self.recent.clear();
        self.pending_toast = None;
        self.is_polling = false;
        self.last_seen_id = 0;
        self.shown_ids.clear();
        self.consecutive_failures = 0;
    }
}

struct PollerInner<S> {
    source: S,
    config: PollerConfig,
    state: Mutex<PollState>,
    /// Set while a fetch is in flight so a slow network cannot cause
    /// overlapping fetches and duplicate-toast races.
    fetch_in_flight: AtomicBool,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Coordinator for unread-notification polling. Cheap to clone; all clones
/// share one state instance.
pub struct NotificationPoller<S> {
    inner: Arc<PollerInner<S>>,
}

impl<S> Clone for NotificationPoller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: NotificationSource + 'static> NotificationPoller<S> {
    /// Create a coordinator with the default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, PollerConfig::default())
    }

    /// Create a coordinator with a custom configuration.
    pub fn with_config(source: S, config: PollerConfig) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                source,
                config,
                state: Mutex::new(PollState::default()),
                fetch_in_flight: AtomicBool::new(false),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the observable state.
    pub fn view(&self) -> PollerView {
        let state = self.inner.state.lock();
        PollerView {
            unread_count: state.unread_count,
            recent_notifications: state.recent.clone(),
            pending_toast: state.pending_toast.clone(),
            is_polling: state.is_polling,
        }
    }

    /// Whether the periodic fetch loop is currently active.
    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().is_polling
    }

    /// Acknowledge the pending toast. The notification stays in
    /// `shown_ids`, so it will not be surfaced again this session.
    pub fn clear_pending_toast(&self) {
        self.inner.state.lock().pending_toast = None;
    }

    /// Record that a notification was already presented through some other
    /// path, so the toast policy must skip it.
    pub fn mark_shown(&self, id: i64) {
        self.inner.state.lock().shown_ids.insert(id);
    }

    /// Out-of-band fetch, e.g. pull-to-refresh.
    ///
    /// Runs the same fetch-and-reconcile step as a scheduled tick,
    /// including dedup and failure counting, without disturbing the
    /// interval's timing. Never fails; callers observe the outcome through
    /// the state. A successful refresh restarts a loop that had stopped
    /// itself at the failure threshold.
    pub async fn refresh(&self) {
        if self.inner.state.lock().user.is_none() {
            return;
        }
        self.fetch_once().await;

        let revive = {
            let state = self.inner.state.lock();
            state.user.is_some() && !state.is_polling && state.consecutive_failures == 0
        };
        if revive {
            self.start_polling();
        }
    }

    /// Apply a session transition. `Some` starts the loop, `None` stops it
    /// and clears every state field.
    pub fn handle_session_change(&self, user: Option<UserIdentity>) {
        match user {
            Some(user) => {
                info!(username = %user.username, "session started");
                self.inner.state.lock().user = Some(user);
                self.start_polling();
            }
            None => {
                self.stop_polling();
                let mut state = self.inner.state.lock();
                state.user = None;
                state.reset();
                info!("session ended, notification state cleared");
            }
        }
    }

    /// Apply an app lifecycle transition.
    ///
    /// A background-to-foreground transition restarts the loop when a
    /// session is present and polling is not active (e.g. it had stopped
    /// itself at the failure threshold). Going to background needs no
    /// action; ticks skip their network call while backgrounded.
    pub fn handle_lifecycle_change(&self, next: AppLifecycle) {
        let resume = {
            let mut state = self.inner.state.lock();
            let previous = state.lifecycle;
            state.lifecycle = next;
            !previous.is_foreground()
                && next.is_foreground()
                && state.user.is_some()
                && !state.is_polling
        };

        if resume {
            info!("app foregrounded, resuming notification polling");
            self.start_polling();
        } else if !next.is_foreground() {
            debug!("app backgrounded, polling paused");
        }
    }

    /// Start the periodic fetch loop. No-op without a session or when
    /// already polling. Fetches immediately, then on every interval tick
    /// while the app is foregrounded.
    pub fn start_polling(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.user.is_none() || state.is_polling {
                return;
            }
            state.is_polling = true;
        }
        info!("starting notification polling");

        let poller = self.clone();
        let task = tokio::spawn(async move {
            poller.fetch_once().await;

            let mut ticker = tokio::time::interval(poller.inner.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately; the
            // fetch above already covered it.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let (polling, foreground) = {
                    let state = poller.inner.state.lock();
                    (state.is_polling, state.lifecycle.is_foreground())
                };
                if !polling {
                    break;
                }
                if !foreground {
                    debug!("skipping poll tick while backgrounded");
                    continue;
                }
                poller.fetch_once().await;
            }
        });

        // A loop that stopped itself at the failure threshold may still be
        // parked on its ticker; replacing the handle aborts it.
        if let Some(stale) = self.inner.poll_task.lock().replace(task) {
            stale.abort();
        }
    }

    /// Cancel the periodic fetch loop. Idempotent. An in-flight fetch is
    /// allowed to complete; its result is discarded if the session has
    /// ended by then.
    pub fn stop_polling(&self) {
        if let Some(task) = self.inner.poll_task.lock().take() {
            task.abort();
        }
        let mut state = self.inner.state.lock();
        if state.is_polling {
            state.is_polling = false;
            info!("notification polling stopped");
        }
    }

    /// Spawn a task that drives [`handle_session_change`] from a session
    /// watch channel, applying the current value first.
    ///
    /// [`handle_session_change`]: NotificationPoller::handle_session_change
    pub fn attach_session(
        &self,
        mut rx: watch::Receiver<Option<UserIdentity>>,
    ) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            poller.handle_session_change(rx.borrow_and_update().clone());
            while rx.changed().await.is_ok() {
                let user = rx.borrow_and_update().clone();
                poller.handle_session_change(user);
            }
        })
    }

    /// Spawn a task that drives [`handle_lifecycle_change`] from a
    /// lifecycle watch channel.
    ///
    /// [`handle_lifecycle_change`]: NotificationPoller::handle_lifecycle_change
    pub fn attach_lifecycle(&self, mut rx: watch::Receiver<AppLifecycle>) -> JoinHandle<()> {
        let poller = self.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let next = *rx.borrow_and_update();
                poller.handle_lifecycle_change(next);
            }
        })
    }

    /// One fetch-and-reconcile step. Shared by scheduled ticks and
    /// [`refresh`]; never propagates errors.
    ///
    /// [`refresh`]: NotificationPoller::refresh
    async fn fetch_once(&self) {
        if self.inner.fetch_in_flight.swap(true, Ordering::AcqRel) {
            debug!("fetch already in flight, skipping");
            return;
        }
        let _in_flight = InFlightGuard(&self.inner.fetch_in_flight);

        let epoch = {
            let state = self.inner.state.lock();
            if state.user.is_none() {
                return;
            }
            state.epoch
        };

        let result = self
            .inner
            .source
            .unread_notifications(1, self.inner.config.page_limit)
            .await;
        let now = Utc::now();

        let mut state = self.inner.state.lock();
        if state.epoch != epoch || state.user.is_none() {
            debug!("session ended during fetch, discarding result");
            return;
        }

        match result {
            Ok(page) => {
                state.consecutive_failures = 0;
                reconcile(&mut state, page, now, &self.inner.config);
            }
            Err(error) => {
                state.consecutive_failures += 1;
                warn!(
                    %error,
                    failures = state.consecutive_failures,
                    "notification fetch failed"
                );
                if state.consecutive_failures >= self.inner.config.failure_threshold
                    && state.is_polling
                {
                    warn!("stopping notification polling after repeated failures");
                    state.is_polling = false;
                }
            }
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fold a successful fetch into the state.
///
/// Applies the display state (count, capped recent list) and the toast
/// policy on the newest entry:
///
/// 1. id at or below `last_seen_id`: already known, no change;
/// 2. id already shown: advance `last_seen_id`, no toast;
/// 3. older than the recency window: advance `last_seen_id`, no toast;
/// 4. otherwise: surface as toast, record as shown, advance `last_seen_id`.
///
/// Idempotent for an unchanged backend: running it twice with the same page
/// yields no further toast.
fn reconcile(state: &mut PollState, page: UnreadPage, now: DateTime<Utc>, config: &PollerConfig) {
    state.unread_count = page.unread_count;

    let mut recent = page.notifications;
    recent.truncate(config.max_stored);

    if let Some(head) = recent.first()
        && head.id > state.last_seen_id
    {
        let already_shown = state.shown_ids.contains(&head.id);
        let window = chrono::Duration::from_std(config.recency_window)
            .unwrap_or(chrono::Duration::MAX);
        let recent_enough = head.age(now) < window;

        if !already_shown && recent_enough {
            debug!(id = head.id, kind = %head.kind, "surfacing notification toast");
            state.shown_ids.insert(head.id);
            state.pending_toast = Some(head.clone());
        }
        state.last_seen_id = head.id;
    }

    state.recent = recent;
}
