//! Integration tests running the API client and the polling coordinator
//! against a mock board backend over real HTTP.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use neighborly_notify::client::{ApiClient, ApiError};
use neighborly_notify::poller::{NotificationPoller, PollerConfig};
use neighborly_notify::session::UserIdentity;

/// Scripted board backend. Each list request pops the next scripted
/// response; an empty script yields an empty success page.
#[derive(Default)]
struct MockBackend {
    responses: Mutex<VecDeque<(StatusCode, Value)>>,
    fail_all: AtomicBool,
    list_calls: AtomicU32,
    last_query: Mutex<Option<HashMap<String, String>>>,
    marked_read: Mutex<Vec<i64>>,
    mark_all_calls: AtomicU32,
    required_token: Option<String>,
}

impl MockBackend {
    fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn push_page(&self, body: Value) {
        self.responses.lock().push_back((StatusCode::OK, body));
    }
}

fn notification_json(id: i64, age_secs: i64) -> Value {
    json!({
        "id": id,
        "content": format!("notification {id}"),
        "timestamp": (Utc::now() - chrono::Duration::seconds(age_secs)).to_rfc3339(),
        "type": "TASK_APPLIED",
        "type_display": "Volunteer Applied",
        "is_read": false,
        "related_task": null
    })
}

/// Success envelope for a list of (id, age-in-seconds) pairs, newest-first.
fn page_body(entries: &[(i64, i64)]) -> Value {
    let notifications: Vec<Value> = entries
        .iter()
        .map(|&(id, age)| notification_json(id, age))
        .collect();
    json!({
        "status": "success",
        "data": {
            "notifications": notifications,
            "pagination": {
                "count": entries.len(),
                "page": 1,
                "pages": 1,
                "limit": 10,
                "next": null,
                "previous": null
            },
            "unread_count": entries.len()
        }
    })
}

fn authorized(backend: &MockBackend, headers: &HeaderMap) -> bool {
    match &backend.required_token {
        Some(token) => {
            let expected = format!("Bearer {token}");
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == expected)
        }
        None => true,
    }
}

async fn list_notifications(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    backend.list_calls.fetch_add(1, Ordering::SeqCst);
    *backend.last_query.lock() = Some(params);

    if !authorized(&backend, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "error", "message": "authentication required"})),
        );
    }
    if backend.fail_all.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": "internal error"})),
        );
    }

    let scripted = backend.responses.lock().pop_front();
    match scripted {
        Some((status, body)) => (status, Json(body)),
        None => (StatusCode::OK, Json(page_body(&[]))),
    }
}

async fn mark_read(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
) -> Json<Value> {
    backend.marked_read.lock().push(id);
    let mut body = notification_json(id, 0);
    body["is_read"] = json!(true);
    Json(json!({"status": "success", "message": "marked as read", "data": body}))
}

async fn mark_all_read(State(backend): State<Arc<MockBackend>>) -> Json<Value> {
    backend.mark_all_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({"status": "success", "message": "all notifications marked as read"}))
}

async fn spawn_backend(backend: Arc<MockBackend>) -> SocketAddr {
    let app = Router::new()
        .route("/notifications/", get(list_notifications))
        .route("/notifications/:id/mark-read/", post(mark_read))
        .route("/notifications/mark-all-read/", post(mark_all_read))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> ApiClient {
    ApiClient::new(&format!("http://{addr}"))
}

fn test_user() -> UserIdentity {
    UserIdentity {
        id: 1,
        username: "ana".to_string(),
    }
}

/// Poller config tightened for wall-clock tests.
fn fast_config() -> PollerConfig {
    PollerConfig {
        poll_interval: Duration::from_millis(50),
        failure_threshold: 3,
        ..PollerConfig::default()
    }
}

// ----------------------------------------------------------------------
// ApiClient over HTTP
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_list_notifications_decodes_wire_format() {
    let backend = Arc::new(MockBackend::default());
    backend.push_page(page_body(&[(11, 5), (10, 120)]));
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let page = client_for(addr)
        .list_notifications(1, 10, true)
        .await
        .unwrap();

    assert_eq!(page.unread_count, 2);
    assert_eq!(page.notifications[0].id, 11);
    assert_eq!(page.notifications[0].kind, "TASK_APPLIED");
    assert_eq!(page.pagination.limit, 10);

    let query = backend.last_query.lock().clone().unwrap();
    assert_eq!(query.get("page").map(String::as_str), Some("1"));
    assert_eq!(query.get("limit").map(String::as_str), Some("10"));
    assert_eq!(query.get("unread").map(String::as_str), Some("true"));
}

#[tokio::test]
async fn test_bearer_token_required_and_sent() {
    let backend = Arc::new(MockBackend {
        required_token: Some("sekrit".to_string()),
        ..MockBackend::default()
    });
    backend.push_page(page_body(&[]));
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let err = client_for(addr)
        .list_notifications(1, 10, true)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status(StatusCode::UNAUTHORIZED)));

    let page = client_for(addr)
        .with_token("sekrit")
        .list_notifications(1, 10, true)
        .await
        .unwrap();
    assert!(page.notifications.is_empty());
}

#[tokio::test]
async fn test_error_envelope_is_backend_error() {
    let backend = Arc::new(MockBackend::default());
    backend.responses.lock().push_back((
        StatusCode::OK,
        json!({"status": "error", "message": "notifications unavailable"}),
    ));
    let addr = spawn_backend(backend).await;

    let err = client_for(addr)
        .list_notifications(1, 10, true)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Backend(ref m) if m == "notifications unavailable"));
}

#[tokio::test]
async fn test_mark_read_hits_endpoint() {
    let backend = Arc::new(MockBackend::default());
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let updated = client_for(addr).mark_read(7).await.unwrap();

    assert_eq!(updated.id, 7);
    assert!(updated.is_read);
    assert_eq!(*backend.marked_read.lock(), vec![7]);
}

#[tokio::test]
async fn test_mark_all_read_hits_endpoint() {
    let backend = Arc::new(MockBackend::default());
    let addr = spawn_backend(Arc::clone(&backend)).await;

    client_for(addr).mark_all_read().await.unwrap();

    assert_eq!(backend.mark_all_calls.load(Ordering::SeqCst), 1);
}

// ----------------------------------------------------------------------
// Poller over HTTP
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_poller_surfaces_toast_once() {
    let backend = Arc::new(MockBackend::default());
    backend.push_page(page_body(&[(10, 2)]));
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let poller = NotificationPoller::with_config(client_for(addr), fast_config());
    poller.handle_session_change(Some(test_user()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = poller.view();
    assert_eq!(view.pending_toast.map(|n| n.id), Some(10));
    assert_eq!(view.unread_count, 1);

    // Later polls return empty pages; acknowledging must be final.
    poller.clear_pending_toast();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(poller.view().pending_toast.is_none());

    poller.stop_polling();
}

#[tokio::test]
async fn test_poller_ignores_stale_backlog() {
    let backend = Arc::new(MockBackend::default());
    // Head is minutes old, as after opening the app onto a backlog.
    backend.push_page(page_body(&[(42, 300), (41, 600)]));
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let poller = NotificationPoller::with_config(client_for(addr), fast_config());
    poller.handle_session_change(Some(test_user()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = poller.view();
    assert!(view.pending_toast.is_none());
    assert_eq!(view.recent_notifications.len(), 2);

    poller.stop_polling();
}

#[tokio::test]
async fn test_poller_circuit_breaker_over_http() {
    let backend = Arc::new(MockBackend::default());
    backend.fail_all.store(true, Ordering::SeqCst);
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let poller = NotificationPoller::with_config(client_for(addr), fast_config());
    poller.handle_session_change(Some(test_user()));

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!poller.is_polling());
    let calls = backend.list_calls();
    assert_eq!(calls, 3);

    // The stopped loop must not reach the backend again.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.list_calls(), calls);

    // An explicit refresh against a recovered backend resumes polling.
    backend.fail_all.store(false, Ordering::SeqCst);
    poller.refresh().await;
    assert!(poller.is_polling());

    poller.stop_polling();
}

#[tokio::test]
async fn test_logout_then_relogin_retoasts() {
    let backend = Arc::new(MockBackend::default());
    backend.push_page(page_body(&[(10, 2)]));
    let addr = spawn_backend(Arc::clone(&backend)).await;

    let poller = NotificationPoller::with_config(client_for(addr), fast_config());
    poller.handle_session_change(Some(test_user()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(poller.view().pending_toast.map(|n| n.id), Some(10));

    poller.handle_session_change(None);
    let view = poller.view();
    assert_eq!(view.unread_count, 0);
    assert!(view.recent_notifications.is_empty());
    assert!(view.pending_toast.is_none());

    // Fresh session: the same id counts as new again.
    backend.push_page(page_body(&[(10, 2)]));
    poller.handle_session_change(Some(test_user()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(poller.view().pending_toast.map(|n| n.id), Some(10));

    poller.stop_polling();
}
