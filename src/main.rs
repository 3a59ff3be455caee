//! Neighborly Notify - notification polling for the Neighborly assistance board.
//!
//! Demo binary: signs in a synthetic session, runs the polling coordinator
//! against a real board backend, and logs every surfaced toast until
//! interrupted.
//!
//! # Environment
//!
//! - `NEIGHBORLY_API_URL` - API base URL (default: `http://localhost:8000/api/v1`)
//! - `NEIGHBORLY_API_TOKEN` - bearer token, if the backend requires one
//! - `NEIGHBORLY_POLL_SECS` - poll interval in seconds (default: 5)

use std::env;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use neighborly_notify::client::ApiClient;
use neighborly_notify::lifecycle::LifecycleHandle;
use neighborly_notify::poller::{NotificationPoller, PollerConfig};
use neighborly_notify::session::{SessionHandle, UserIdentity};

/// Default API base URL if not specified via environment variable.
const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("neighborly_notify=info".parse()?))
        .init();

    // Load configuration from environment
    let api_url = env::var("NEIGHBORLY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let poll_secs: u64 = env::var("NEIGHBORLY_POLL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    info!(api_url = %api_url, poll_secs, "Starting Neighborly notification poller");

    let mut client = ApiClient::new(&api_url);
    if let Ok(token) = env::var("NEIGHBORLY_API_TOKEN") {
        client = client.with_token(&token);
    }

    let config = PollerConfig {
        poll_interval: Duration::from_secs(poll_secs),
        ..PollerConfig::default()
    };
    let poller = NotificationPoller::with_config(client, config);

    let session = SessionHandle::new();
    let lifecycle = LifecycleHandle::new();
    poller.attach_session(session.subscribe());
    poller.attach_lifecycle(lifecycle.subscribe());

    session.sign_in(UserIdentity {
        id: 0,
        username: env::var("USER").unwrap_or_else(|_| "local".to_string()),
    });

    // Surface toasts to the log until interrupted.
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let view = poller.view();
                if let Some(toast) = view.pending_toast {
                    info!(
                        id = toast.id,
                        kind = %toast.kind,
                        content = %toast.content,
                        unread = view.unread_count,
                        "new notification"
                    );
                    poller.clear_pending_toast();
                }
            }
        }
    }

    session.sign_out();
    info!("Shutting down");

    Ok(())
}
