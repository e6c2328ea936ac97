//! Inbox integration tests
//!
//! End-to-end coverage of the feed and migration flow over a stub backend:
//! initial load, pending-thread acceptance, ordering and counter
//! invariants, and observer notification.

use async_trait::async_trait;
use dm_core::{
    DirectApi, DirectError, DirectItem, DirectMessagesManager, DirectThread, InboxResponse,
    SendDestination,
};
use std::sync::Arc;
use uuid::Uuid;

/// Stub backend serving fixed inbox pages
struct StubApi {
    accepted: Vec<DirectThread>,
    pending: Vec<DirectThread>,
    total: i64,
}

impl StubApi {
    fn new(accepted: Vec<DirectThread>, pending: Vec<DirectThread>, total: i64) -> Arc<Self> {
        Arc::new(Self {
            accepted,
            pending,
            total,
        })
    }
}

#[async_trait]
impl DirectApi for StubApi {
    async fn fetch_inbox(&self, pending: bool) -> Result<InboxResponse, DirectError> {
        let threads = if pending {
            self.pending.clone()
        } else {
            self.accepted.clone()
        };
        Ok(InboxResponse {
            threads,
            pending_requests_total: self.total,
        })
    }

    async fn create_thread(&self, _user_ids: Vec<u64>) -> Result<DirectThread, DirectError> {
        unimplemented!("not exercised by inbox tests")
    }

    async fn broadcast_media_share(
        &self,
        _client_context: Uuid,
        _destination: SendDestination,
        _media_id: String,
    ) -> Result<(), DirectError> {
        unimplemented!("not exercised by inbox tests")
    }
}

fn thread(id: &str, ts: Option<i64>, pending: bool) -> DirectThread {
    let mut thread = DirectThread::new(id);
    thread.pending = pending;
    if let Some(ts) = ts {
        thread.items.push(DirectItem::new(format!("item-{}", id), ts));
    }
    thread
}

async fn load(manager: &DirectMessagesManager<StubApi>) {
    manager.inbox().refresh().await.unwrap();
    manager.pending_inbox().refresh().await.unwrap();
}

#[tokio::test]
async fn test_initial_load_populates_both_feeds() {
    let api = StubApi::new(
        vec![thread("t2", Some(150), false), thread("t3", Some(80), false)],
        vec![thread("t1", Some(100), true)],
        1,
    );
    let manager = DirectMessagesManager::new(api);
    load(&manager).await;

    assert_eq!(manager.inbox().len().await, 2);
    assert_eq!(manager.pending_inbox().len().await, 1);
    assert_eq!(manager.inbox().pending_requests_total().await, Some(1));
    assert_eq!(*manager.inbox().watch_pending_total().borrow(), 1);
}

#[tokio::test]
async fn test_accepting_request_moves_thread_between_feeds() {
    let api = StubApi::new(
        vec![thread("t2", Some(150), false), thread("t3", Some(80), false)],
        vec![thread("t1", Some(100), true)],
        1,
    );
    let manager = DirectMessagesManager::new(api);
    load(&manager).await;

    let mut accepted_rx = manager.inbox().watch_entries();
    accepted_rx.borrow_and_update();
    let total_rx = manager.inbox().watch_pending_total();

    manager.move_thread_from_pending("t1").await;

    // Placed between the newer and older threads, flag cleared
    let ids: Vec<String> = manager
        .inbox()
        .entries()
        .await
        .into_iter()
        .map(|t| t.thread_id)
        .collect();
    assert_eq!(ids, vec!["t2", "t1", "t3"]);
    assert!(!manager.inbox().entries().await[1].pending);

    // Counter decremented by exactly one, observers saw the changes
    assert_eq!(manager.inbox().pending_requests_total().await, Some(0));
    assert_eq!(*total_rx.borrow(), 0);
    assert!(accepted_rx.has_changed().unwrap());

    // Never in both feeds at once
    assert!(!manager.pending_inbox().contains("t1").await);
    assert!(manager.inbox().contains("t1").await);
}

#[tokio::test]
async fn test_accepting_unknown_request_changes_nothing() {
    let api = StubApi::new(
        vec![thread("t2", Some(150), false)],
        vec![thread("t1", Some(100), true)],
        1,
    );
    let manager = DirectMessagesManager::new(api);
    load(&manager).await;

    manager.move_thread_from_pending("unknown-id").await;

    assert_eq!(manager.inbox().len().await, 1);
    assert_eq!(manager.pending_inbox().len().await, 1);
    assert_eq!(manager.inbox().pending_requests_total().await, Some(1));
}

#[tokio::test]
async fn test_sequential_migrations_keep_ordering_invariant() {
    let api = StubApi::new(
        vec![thread("t2", Some(150), false), thread("t3", Some(80), false)],
        vec![
            thread("p1", Some(100), true),
            thread("p2", Some(200), true),
            thread("p3", Some(50), true),
        ],
        3,
    );
    let manager = DirectMessagesManager::new(api);
    load(&manager).await;

    manager.move_thread_from_pending("p1").await;
    manager.move_thread_from_pending("p2").await;
    manager.move_thread_from_pending("p3").await;

    let timestamps: Vec<i64> = manager
        .inbox()
        .entries()
        .await
        .iter()
        .filter_map(|t| t.last_activity_ts())
        .collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(timestamps, sorted);

    assert!(manager.pending_inbox().is_empty().await);
    assert_eq!(manager.inbox().pending_requests_total().await, Some(0));

    // No id appears twice anywhere
    let ids: Vec<String> = manager
        .inbox()
        .entries()
        .await
        .into_iter()
        .map(|t| t.thread_id)
        .collect();
    let mut deduped = ids.clone();
    deduped.dedup();
    assert_eq!(ids, deduped);
}
