//! Wire types for the Neighborly notifications API.
//!
//! The board backend wraps every response in a uniform envelope:
//!
//! ```json
//! {
//!     "status": "success",
//!     "message": "...",
//!     "data": { ... }
//! }
//! ```
//!
//! Types here mirror that envelope and the notification list payload inside
//! it. Everything except `id` and `timestamp` is opaque to the polling
//! coordinator; the textual fields exist only so UI consumers can render
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification, as returned by the board backend.
///
/// Ids are unique and strictly increasing with creation order; the
/// coordinator's dedup logic depends on that ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique, monotonically increasing identifier.
    pub id: i64,

    /// Human-readable notification text.
    #[serde(default)]
    pub content: String,

    /// When the notification was created (UTC, ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,

    /// Machine-readable kind, e.g. "TASK_APPLIED", "REVIEW_RECEIVED".
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Display label for the kind, e.g. "Volunteer Applied".
    #[serde(default)]
    pub type_display: String,

    /// Whether the recipient has already read this notification.
    #[serde(default)]
    pub is_read: bool,

    /// The task this notification refers to, if any. Opaque to the
    /// coordinator; passed through to UI consumers untouched.
    #[serde(default)]
    pub related_task: Option<serde_json::Value>,
}

impl Notification {
    /// How old this notification is relative to `now`.
    ///
    /// Negative if the backend's clock is ahead of ours.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

/// The backend's uniform response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// "success" on the happy path, "error" otherwise.
    #[serde(default)]
    pub status: String,

    /// Optional human-readable message, mostly set on errors.
    #[serde(default)]
    pub message: Option<String>,

    /// The actual payload. Absent on some error responses and on
    /// acknowledgement-only endpoints.
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Whether the backend reported success.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Payload of `GET /notifications/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UnreadPage {
    /// Notifications for the requested page, ordered newest-first.
    #[serde(default)]
    pub notifications: Vec<Notification>,

    /// Pagination block describing the full result set.
    #[serde(default)]
    pub pagination: PageInfo,

    /// Total unread notifications for the current user, across all pages.
    #[serde(default)]
    pub unread_count: u64,
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    /// Total number of items across all pages.
    #[serde(default)]
    pub count: u64,

    /// Current page number (1-based).
    #[serde(default)]
    pub page: u32,

    /// Total number of pages.
    #[serde(default)]
    pub pages: u32,

    /// Page size that was applied.
    #[serde(default)]
    pub limit: u32,

    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,

    /// URL of the previous page, if any.
    #[serde(default)]
    pub previous: Option<String>,
}
