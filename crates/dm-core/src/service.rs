//! Typed backend service for direct messaging
//!
//! Wraps the REST transport in the three calls the messaging core consumes:
//! inbox fetch, thread creation, and media-share broadcast. The `DirectApi`
//! trait is the seam the dispatcher and feeds are written against; the
//! production implementation is [`DirectService`].

use async_trait::async_trait;
use direct_client::rest::{ApiClient, ApiClientConfig, ApiError, ApiRequest};
use direct_client::session::SessionContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{DirectThread, SendDestination};

#[cfg(test)]
use mockall::automock;

/// Errors that can occur during messaging operations
#[derive(Debug, thiserror::Error)]
pub enum DirectError {
    /// Transport or server error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Recipient has neither an existing thread nor a user
    #[error("invalid recipient: neither thread nor user present")]
    InvalidRecipient,

    /// The server accepted the request but rejected the operation
    #[error("rejected by server: {0}")]
    Rejected(String),
}

/// Result type for messaging operations
pub type Result<T> = std::result::Result<T, DirectError>;

/// Full inbox page as returned by the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxResponse {
    /// Threads ordered by recency, front = most recent
    pub threads: Vec<DirectThread>,
    /// Number of unaccepted message requests
    #[serde(default)]
    pub pending_requests_total: i64,
}

/// Response from a share broadcast
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    /// Server status string, "ok" on success
    pub status: String,
}

impl BroadcastResponse {
    /// Whether the server accepted the broadcast
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Backend operations the messaging core depends on
///
/// Every call is async and resolves to a value; errors never cross this
/// boundary as panics. Transport-managed timeouts surface as `Err` like any
/// other failure.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DirectApi: Send + Sync {
    /// Fetch the accepted (`pending = false`) or pending (`pending = true`)
    /// inbox page.
    async fn fetch_inbox(&self, pending: bool) -> Result<InboxResponse>;

    /// Create a conversation with the given users
    ///
    /// Idempotent at the call site: callers make no assumption about
    /// server-side dedup and treat every call as potentially creating a
    /// fresh thread.
    async fn create_thread(&self, user_ids: Vec<u64>) -> Result<DirectThread>;

    /// Share a media item into a destination
    ///
    /// `client_context` is a per-call idempotency token letting the server
    /// deduplicate retried sends.
    async fn broadcast_media_share(
        &self,
        client_context: Uuid,
        destination: SendDestination,
        media_id: String,
    ) -> Result<()>;
}

/// Request body for thread creation
#[derive(Debug, Serialize)]
struct CreateThreadRequest<'a> {
    #[serde(rename = "_uid")]
    viewer_id: u64,
    #[serde(rename = "_uuid")]
    device_uuid: &'a str,
    #[serde(rename = "_csrftoken")]
    csrf_token: &'a str,
    recipient_users: String,
}

/// Request body for a media-share broadcast
#[derive(Debug, Serialize)]
struct BroadcastMediaShareRequest<'a> {
    #[serde(rename = "_uid")]
    viewer_id: u64,
    #[serde(rename = "_uuid")]
    device_uuid: &'a str,
    #[serde(rename = "_csrftoken")]
    csrf_token: &'a str,
    client_context: String,
    media_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ids: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient_users: Option<String>,
}

/// Production implementation of [`DirectApi`] over the REST client
///
/// # Example
///
/// ```no_run
/// use direct_client::rest::ApiClientConfig;
/// use direct_client::session::SessionContext;
/// use dm_core::service::{DirectApi, DirectService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Arc::new(SessionContext::from_parts(
///     "user_id=4412; csrftoken=tok123",
///     "device-1",
/// )?);
/// let service = DirectService::new(session, ApiClientConfig::default());
/// let inbox = service.fetch_inbox(false).await?;
/// println!("{} conversations", inbox.threads.len());
/// # Ok(())
/// # }
/// ```
pub struct DirectService {
    /// REST client with session headers installed
    client: ApiClient,
    /// Authenticated identity
    session: Arc<SessionContext>,
}

impl DirectService {
    /// Create a new service for the given session
    ///
    /// The anti-forgery token and device id ride on every request as
    /// default headers; mutating calls additionally carry them in the body.
    pub fn new(session: Arc<SessionContext>, config: ApiClientConfig) -> Self {
        let config = config
            .with_header("X-CSRFToken", session.csrf_token())
            .with_header("X-Device-ID", session.device_uuid());

        Self {
            client: ApiClient::new(config),
            session,
        }
    }

    /// The session this service authenticates as
    pub fn session(&self) -> &SessionContext {
        &self.session
    }
}

#[async_trait]
impl DirectApi for DirectService {
    async fn fetch_inbox(&self, pending: bool) -> Result<InboxResponse> {
        let path = if pending {
            "direct_v2/pending_inbox"
        } else {
            "direct_v2/inbox"
        };

        let request = ApiRequest::get(path).param("limit", "20");
        let response = self.client.get::<InboxResponse>(request).await?;
        Ok(response.data)
    }

    async fn create_thread(&self, user_ids: Vec<u64>) -> Result<DirectThread> {
        let body = CreateThreadRequest {
            viewer_id: self.session.viewer_id(),
            device_uuid: self.session.device_uuid(),
            csrf_token: self.session.csrf_token(),
            recipient_users: serde_json::to_string(&user_ids)?,
        };

        let request = ApiRequest::post("direct_v2/create_group_thread").json_body(&body)?;
        let response = self
            .client
            .post::<DirectThread>(request)
            .await
            .map_err(|e| {
                tracing::error!(?user_ids, "thread creation failed: {}", e);
                e
            })?;

        Ok(response.data)
    }

    async fn broadcast_media_share(
        &self,
        client_context: Uuid,
        destination: SendDestination,
        media_id: String,
    ) -> Result<()> {
        let body = BroadcastMediaShareRequest {
            viewer_id: self.session.viewer_id(),
            device_uuid: self.session.device_uuid(),
            csrf_token: self.session.csrf_token(),
            client_context: client_context.to_string(),
            media_id: &media_id,
            thread_ids: destination.thread_ids_param(),
            recipient_users: destination.recipient_users_param(),
        };

        let request = ApiRequest::post("direct_v2/broadcast/media_share").json_body(&body)?;
        let response = self.client.post::<BroadcastResponse>(request).await?;

        if !response.data.is_ok() {
            return Err(DirectError::Rejected(response.data.status));
        }
        Ok(())
    }
}
