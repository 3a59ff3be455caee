//! HTTP client for the board's notification endpoints.
//!
//! Wraps the three notification calls the mobile app uses:
//!
//! - `GET /notifications/?page=&limit=&unread=` - list notifications
//! - `POST /notifications/{id}/mark-read/` - mark one as read
//! - `POST /notifications/mark-all-read/` - mark all as read
//!
//! Requests carry a bearer token when one is configured. The polling
//! coordinator consumes this client through the [`NotificationSource`]
//! trait so tests can substitute a scripted fake.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::model::{ApiEnvelope, Notification, UnreadPage};

/// Errors from the board API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never completed (connection refused, timeout, DNS, ...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    /// The response body was not the expected JSON shape.
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),

    /// The envelope came back with `status != "success"`.
    #[error("backend reported failure: {0}")]
    Backend(String),

    /// A success envelope arrived without its `data` payload.
    #[error("response missing data payload")]
    MissingData,
}

/// Anything the polling coordinator can fetch unread notifications from.
///
/// `page` is 1-based; `limit` caps the page size. Implementations must
/// return the list ordered newest-first, matching the backend contract.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn unread_notifications(&self, page: u32, limit: u32) -> Result<UnreadPage, ApiError>;
}

#[async_trait]
impl<S: NotificationSource + ?Sized> NotificationSource for std::sync::Arc<S> {
    async fn unread_notifications(&self, page: u32, limit: u32) -> Result<UnreadPage, ApiError> {
        (**self).unread_notifications(page, limit).await
    }
}

/// Client for the Neighborly board REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the given API base URL (no trailing slash).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Fetch a page of the current user's notifications.
    ///
    /// With `unread_only`, read notifications are filtered out server-side
    /// and `unread_count` still reflects the full unread total.
    pub async fn list_notifications(
        &self,
        page: u32,
        limit: u32,
        unread_only: bool,
    ) -> Result<UnreadPage, ApiError> {
        let url = format!(
            "{}/notifications/?page={}&limit={}&unread={}",
            self.base_url, page, limit, unread_only
        );

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let envelope = response
            .json::<ApiEnvelope<UnreadPage>>()
            .await
            .map_err(ApiError::Decode)?;
        unwrap_envelope(envelope)
    }

    /// Mark a single notification as read. Returns the updated notification.
    pub async fn mark_read(&self, id: i64) -> Result<Notification, ApiError> {
        let url = format!("{}/notifications/{}/mark-read/", self.base_url, id);
        let envelope = self.post(&url).await?;
        unwrap_envelope(envelope)
    }

    /// Mark every notification of the current user as read.
    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let url = format!("{}/notifications/mark-all-read/", self.base_url);
        // Acknowledgement-only endpoint; the envelope carries no data.
        let envelope: ApiEnvelope<serde_json::Value> = self.post(&url).await?;
        if envelope.is_success() {
            Ok(())
        } else {
            Err(backend_failure(envelope.message))
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let mut request = self.client.post(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        response
            .json::<ApiEnvelope<T>>()
            .await
            .map_err(ApiError::Decode)
    }
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn unread_notifications(&self, page: u32, limit: u32) -> Result<UnreadPage, ApiError> {
        self.list_notifications(page, limit, true).await
    }
}

fn unwrap_envelope<T>(envelope: ApiEnvelope<T>) -> Result<T, ApiError> {
    if !envelope.is_success() {
        return Err(backend_failure(envelope.message));
    }
    envelope.data.ok_or(ApiError::MissingData)
}

fn backend_failure(message: Option<String>) -> ApiError {
    ApiError::Backend(message.unwrap_or_else(|| "no message".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_envelope_success() {
        let envelope = ApiEnvelope {
            status: "success".to_string(),
            message: None,
            data: Some(7),
        };

        assert_eq!(unwrap_envelope(envelope).unwrap(), 7);
    }

    #[test]
    fn test_unwrap_envelope_backend_error() {
        let envelope: ApiEnvelope<i32> = ApiEnvelope {
            status: "error".to_string(),
            message: Some("notifications unavailable".to_string()),
            data: None,
        };

        let err = unwrap_envelope(envelope).unwrap_err();
        assert!(matches!(err, ApiError::Backend(ref m) if m == "notifications unavailable"));
    }

    #[test]
    fn test_unwrap_envelope_missing_data() {
        let envelope: ApiEnvelope<i32> = ApiEnvelope {
            status: "success".to_string(),
            message: None,
            data: None,
        };

        assert!(matches!(
            unwrap_envelope(envelope).unwrap_err(),
            ApiError::MissingData
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/api/v1/");
        assert_eq!(client.base_url, "http://localhost:8000/api/v1");
    }
}
