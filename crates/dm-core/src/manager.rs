//! Direct-messages manager
//!
//! Owns the accepted and pending inbox feeds, reconciles a thread's move
//! from pending to accepted when the viewer approves a message request, and
//! dispatches outbound shares to one or many recipients.
//!
//! Dispatch is structured as explicit async composition: resolving a
//! recipient (creating a conversation first when none exists) is one
//! sequential chain, and fan-out across recipients runs one task per
//! recipient with an atomic completion count gating the single aggregate
//! inbox refresh.

use async_trait::async_trait;
use direct_client::rest::ApiClientConfig;
use direct_client::session::SessionContext;
use inbox_state::{FeedError, InboxFeed, InboxPage, InboxSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{DirectThread, RankedRecipient, SendDestination};
use crate::resource::Resource;
use crate::service::{DirectApi, DirectError, DirectService, Result};

/// Inbox page source backed by the typed API
pub struct DirectInboxSource<A> {
    api: Arc<A>,
}

impl<A> DirectInboxSource<A> {
    /// Create a new source over the given API
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: DirectApi + 'static> InboxSource for DirectInboxSource<A> {
    type Entry = DirectThread;

    async fn fetch_page(
        &self,
        pending: bool,
    ) -> std::result::Result<InboxPage<DirectThread>, FeedError> {
        let response = self
            .api
            .fetch_inbox(pending)
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;

        Ok(InboxPage {
            entries: response.threads,
            pending_requests_total: response.pending_requests_total,
        })
    }
}

/// Aggregate outcome of a fan-out batch
///
/// A batch never fails as a whole; per-recipient failures show up in the
/// counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Number of recipients dispatched to
    pub total: usize,
    /// Recipients whose send completed successfully
    pub succeeded: usize,
    /// Recipients whose send failed (including invalid recipients)
    pub failed: usize,
}

/// Manager for the viewer's direct-message inbox
///
/// Created once per authenticated session. Holds the accepted and pending
/// feeds and the API they refresh through.
///
/// # Example
///
/// ```no_run
/// use direct_client::rest::ApiClientConfig;
/// use direct_client::session::SessionContext;
/// use dm_core::manager::DirectMessagesManager;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Arc::new(SessionContext::from_parts(
///     "user_id=4412; csrftoken=tok123",
///     "device-1",
/// )?);
/// let manager = DirectMessagesManager::from_session(session, ApiClientConfig::default());
///
/// manager.inbox().refresh().await?;
/// manager.pending_inbox().refresh().await?;
/// manager.move_thread_from_pending("thread-id").await;
/// # Ok(())
/// # }
/// ```
pub struct DirectMessagesManager<A: DirectApi + 'static> {
    api: Arc<A>,
    inbox: Arc<InboxFeed<DirectInboxSource<A>>>,
    pending_inbox: Arc<InboxFeed<DirectInboxSource<A>>>,
}

impl DirectMessagesManager<DirectService> {
    /// Build a manager over the production service for the given session
    pub fn from_session(session: Arc<SessionContext>, config: ApiClientConfig) -> Self {
        Self::new(Arc::new(DirectService::new(session, config)))
    }
}

impl<A: DirectApi + 'static> DirectMessagesManager<A> {
    /// Create a manager over the given API
    pub fn new(api: Arc<A>) -> Self {
        let source = Arc::new(DirectInboxSource::new(Arc::clone(&api)));
        let inbox = Arc::new(InboxFeed::new(Arc::clone(&source), false));
        let pending_inbox = Arc::new(InboxFeed::new(source, true));

        Self {
            api,
            inbox,
            pending_inbox,
        }
    }

    /// The accepted-threads feed
    pub fn inbox(&self) -> &Arc<InboxFeed<DirectInboxSource<A>>> {
        &self.inbox
    }

    /// The pending-requests feed
    pub fn pending_inbox(&self) -> &Arc<InboxFeed<DirectInboxSource<A>>> {
        &self.pending_inbox
    }

    /// Move an accepted message request out of the pending feed
    ///
    /// Inserts the thread into the accepted feed at the position recency
    /// ordering dictates, removes it from the pending feed, and decrements
    /// the pending total by exactly one. Silent no-op when the thread is
    /// absent (calling twice for the same id is safe), when the thread has
    /// no messages to order by, or when the pending total has never been
    /// loaded. Every precondition is checked before any mutation, so a
    /// bail-out leaves both feeds untouched.
    pub async fn move_thread_from_pending(&self, thread_id: &str) {
        // The aggregate count is read up front: without it the decrement in
        // the final step could not be computed, and bailing out later would
        // leave the thread removed from pending with a stale total.
        let Some(current_total) = self.inbox.pending_requests_total().await else {
            return;
        };

        let pending_threads = self.pending_inbox.entries().await;
        let Some(thread) = pending_threads
            .into_iter()
            .find(|t| t.thread_id == thread_id)
        else {
            return;
        };

        // A thread with no messages has no reference point for ordering.
        let Some(moved_ts) = thread.last_activity_ts() else {
            return;
        };

        // Scan from the front for the first entry strictly older than the
        // moved thread. Ties keep their position (the moved thread lands
        // after equal timestamps); entries without any message never stop
        // the scan.
        let accepted = self.inbox.entries().await;
        let mut insert_index = accepted.len();
        for (index, existing) in accepted.iter().enumerate() {
            if let Some(ts) = existing.last_activity_ts() {
                if ts < moved_ts {
                    insert_index = index;
                    break;
                }
            }
        }

        let mut thread = thread;
        thread.pending = false;
        self.inbox.insert(thread, insert_index).await;
        self.pending_inbox.remove(thread_id).await;
        self.inbox.set_pending_total(current_total - 1).await;
    }

    /// Create a conversation with a single user
    pub async fn create_thread(&self, user_pk: u64) -> Result<DirectThread> {
        self.api.create_thread(vec![user_pk]).await
    }

    /// Share a media item directly into an existing thread
    ///
    /// The returned value reads `Loading` before any network I/O starts and
    /// resolves exactly once to `Success` or `Error`. Must be called from
    /// within a Tokio runtime.
    pub fn send_to_thread(&self, thread_id: &str, media_id: &str) -> watch::Receiver<Resource<()>> {
        let (tx, rx) = watch::channel(Resource::Loading);
        let api = Arc::clone(&self.api);
        let thread_id = thread_id.to_string();
        let media_id = media_id.to_string();

        tokio::spawn(async move {
            let result = broadcast_media(&*api, &thread_id, &media_id).await;
            let _ = tx.send(match result {
                Ok(()) => Resource::Success(()),
                Err(e) => {
                    tracing::error!(thread_id = %thread_id, "media share failed: {}", e);
                    Resource::Error(e.to_string())
                }
            });
        });

        rx
    }

    /// Share a media item with a single recipient
    ///
    /// Resolves the recipient (creating a conversation first when only a
    /// user is known), performs the send, then triggers exactly one
    /// accepted-inbox refresh regardless of outcome. Must be called from
    /// within a Tokio runtime.
    pub fn send_to_one(
        &self,
        recipient: RankedRecipient,
        media_id: &str,
    ) -> watch::Receiver<Resource<()>> {
        let (tx, rx) = watch::channel(Resource::Loading);
        let api = Arc::clone(&self.api);
        let inbox = Arc::clone(&self.inbox);
        let media_id = media_id.to_string();

        tokio::spawn(async move {
            let result = resolve_and_send(&*api, recipient, &media_id).await;

            if let Err(e) = inbox.refresh().await {
                tracing::warn!("inbox refresh after send failed: {}", e);
            }

            let _ = tx.send(match result {
                Ok(()) => Resource::Success(()),
                Err(e) => Resource::Error(e.to_string()),
            });
        });

        rx
    }

    /// Share a media item with every recipient in the list
    ///
    /// Each recipient is resolved and sent to independently and
    /// concurrently; there is no cross-recipient ordering. Success, error,
    /// and invalid-recipient all count as completion, and the single
    /// accepted-inbox refresh happens-after the last completion, never
    /// before and never twice. The returned value terminates in
    /// `Success(BatchOutcome)` once the batch has fully settled. Must be
    /// called from within a Tokio runtime.
    pub fn send_to_many(
        &self,
        recipients: Vec<RankedRecipient>,
        media_id: &str,
    ) -> watch::Receiver<Resource<BatchOutcome>> {
        let total = recipients.len();
        let (tx, rx) = watch::channel(Resource::Loading);

        if total == 0 {
            let _ = tx.send(Resource::Success(BatchOutcome::default()));
            return rx;
        }

        let tx = Arc::new(tx);
        let completed = Arc::new(AtomicUsize::new(0));
        let succeeded = Arc::new(AtomicUsize::new(0));
        let media_id = media_id.to_string();

        for recipient in recipients {
            let api = Arc::clone(&self.api);
            let inbox = Arc::clone(&self.inbox);
            let tx = Arc::clone(&tx);
            let completed = Arc::clone(&completed);
            let succeeded = Arc::clone(&succeeded);
            let media_id = media_id.clone();

            tokio::spawn(async move {
                match resolve_and_send(&*api, recipient, &media_id).await {
                    Ok(()) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => tracing::warn!("share dispatch failed: {}", e),
                }

                // Serialized completion count: only the task observing the
                // Nth completion performs the refresh and publishes the
                // outcome.
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if done == total {
                    if let Err(e) = inbox.refresh().await {
                        tracing::warn!("inbox refresh after batch failed: {}", e);
                    }
                    let ok = succeeded.load(Ordering::SeqCst);
                    let _ = tx.send(Resource::Success(BatchOutcome {
                        total,
                        succeeded: ok,
                        failed: total - ok,
                    }));
                }
            });
        }

        rx
    }
}

/// Resolve a recipient to a thread id and perform the send
///
/// The create-thread step, when needed, completes before the dependent
/// send is issued; a failure at either step is terminal for this recipient.
async fn resolve_and_send<A: DirectApi>(
    api: &A,
    recipient: RankedRecipient,
    media_id: &str,
) -> Result<()> {
    let thread_id = match (recipient.thread, recipient.user) {
        (Some(thread), _) => thread.thread_id,
        (None, Some(user)) => api.create_thread(vec![user.pk]).await?.thread_id,
        (None, None) => return Err(DirectError::InvalidRecipient),
    };

    broadcast_media(api, &thread_id, media_id).await
}

/// Broadcast a media share into a thread with a fresh idempotency token
async fn broadcast_media<A: DirectApi>(api: &A, thread_id: &str, media_id: &str) -> Result<()> {
    api.broadcast_media_share(
        Uuid::new_v4(),
        SendDestination::thread(thread_id),
        media_id.to_string(),
    )
    .await
}
