//! Observable ordered inbox feed
//!
//! An `InboxFeed` owns an ordered sequence of entries (front = most recent
//! conversation) plus the pending-requests total, and publishes changes to
//! subscribers. All mutation goes through one write guard, so concurrent
//! completion callbacks can never interleave a partial insert or remove.
//! Readers get cloned snapshots or `watch`/`broadcast` subscriptions.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

/// Capacity of the feed event channel
const EVENT_BUFFER_SIZE: usize = 64;

/// Errors that can occur during feed operations
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The backing fetch failed
    #[error("inbox fetch failed: {0}")]
    Fetch(String),
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// An entry that can live in an inbox feed
///
/// The feed only needs a stable identifier; ordering decisions belong to
/// the caller computing insertion positions.
pub trait InboxEntry: Clone + Send + Sync + 'static {
    /// Stable identifier, unique within one feed
    fn entry_id(&self) -> &str;
}

/// One full page of inbox data as fetched from the backend
#[derive(Debug, Clone)]
pub struct InboxPage<T> {
    /// Ordered entries, front = most recent
    pub entries: Vec<T>,
    /// Server-reported pending-requests total
    pub pending_requests_total: i64,
}

/// Source of inbox pages
///
/// Implemented over the transport layer; test code supplies stubs.
#[async_trait]
pub trait InboxSource: Send + Sync {
    /// Entry type this source produces
    type Entry: InboxEntry;

    /// Fetch the full page for the accepted (`pending = false`) or
    /// pending-requests (`pending = true`) inbox.
    async fn fetch_page(&self, pending: bool) -> Result<InboxPage<Self::Entry>>;
}

/// Events broadcast when the feed changes
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// An entry was inserted at the given position
    Inserted {
        /// Entry identifier
        id: String,
        /// Insertion position
        index: usize,
    },
    /// An entry was removed
    Removed {
        /// Entry identifier
        id: String,
    },
    /// The whole feed was replaced by a refresh
    Refreshed {
        /// Number of entries after the refresh
        count: usize,
    },
    /// The pending-requests total changed
    PendingTotalChanged {
        /// New raw total (may be transiently negative)
        total: i64,
    },
}

/// Internal feed state, guarded by one lock
struct FeedState<T> {
    entries: Vec<T>,
    /// None until the first load; negative transients are tolerated
    pending_requests_total: Option<i64>,
}

/// Observable ordered inbox collection
///
/// Two instances exist per session: one for accepted threads and one for
/// pending message requests. Created at session start and kept alive until
/// teardown.
///
/// # Example
///
/// ```no_run
/// use inbox_state::{InboxFeed, InboxSource};
/// use std::sync::Arc;
///
/// async fn example<S: InboxSource>(source: Arc<S>) {
///     let feed = InboxFeed::new(source, false);
///     feed.refresh().await.unwrap();
///     println!("{} conversations", feed.entries().await.len());
/// }
/// ```
pub struct InboxFeed<S: InboxSource> {
    /// Whether this is the pending-requests feed
    pending: bool,
    /// Page source
    source: Arc<S>,
    /// Guarded state
    state: Arc<RwLock<FeedState<S::Entry>>>,
    /// Entries snapshot sender
    entries_tx: watch::Sender<Vec<S::Entry>>,
    /// Clamped pending-total sender (observers never see negatives)
    total_tx: watch::Sender<u32>,
    /// Event broadcaster
    events_tx: broadcast::Sender<FeedEvent>,
}

impl<S: InboxSource> InboxFeed<S> {
    /// Create a new feed over the given source
    pub fn new(source: Arc<S>, pending: bool) -> Self {
        let (entries_tx, _) = watch::channel(Vec::new());
        let (total_tx, _) = watch::channel(0);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);

        Self {
            pending,
            source,
            state: Arc::new(RwLock::new(FeedState {
                entries: Vec::new(),
                pending_requests_total: None,
            })),
            entries_tx,
            total_tx,
            events_tx,
        }
    }

    /// Whether this feed holds pending message requests
    pub fn is_pending_feed(&self) -> bool {
        self.pending
    }

    /// Current snapshot of the ordered entries
    pub async fn entries(&self) -> Vec<S::Entry> {
        self.state.read().await.entries.clone()
    }

    /// Number of entries currently in the feed
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Whether the feed is empty
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Whether an entry with the given id is present
    pub async fn contains(&self, id: &str) -> bool {
        self.state
            .read()
            .await
            .entries
            .iter()
            .any(|e| e.entry_id() == id)
    }

    /// Raw pending-requests total
    ///
    /// `None` until the first successful refresh or explicit set. The raw
    /// value may be transiently negative; use [`watch_pending_total`] for
    /// the clamped observer view.
    ///
    /// [`watch_pending_total`]: Self::watch_pending_total
    pub async fn pending_requests_total(&self) -> Option<i64> {
        self.state.read().await.pending_requests_total
    }

    /// Subscribe to entries snapshots
    pub fn watch_entries(&self) -> watch::Receiver<Vec<S::Entry>> {
        self.entries_tx.subscribe()
    }

    /// Subscribe to the clamped pending-requests total
    pub fn watch_pending_total(&self) -> watch::Receiver<u32> {
        self.total_tx.subscribe()
    }

    /// Subscribe to feed change events
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events_tx.subscribe()
    }

    /// Insert an entry at the given position, shifting the tail back
    ///
    /// Silent no-op (returns `false`) when the index is outside `[0, len]`
    /// or when an entry with the same id is already present.
    pub async fn insert(&self, entry: S::Entry, index: usize) -> bool {
        let mut state = self.state.write().await;
        if index > state.entries.len() {
            return false;
        }
        if state
            .entries
            .iter()
            .any(|e| e.entry_id() == entry.entry_id())
        {
            return false;
        }

        let id = entry.entry_id().to_string();
        state.entries.insert(index, entry);
        let snapshot = state.entries.clone();
        drop(state);

        let _ = self.entries_tx.send(snapshot);
        let _ = self.events_tx.send(FeedEvent::Inserted { id, index });
        true
    }

    /// Remove the first entry with the given id
    ///
    /// Returns the removed entry, or `None` when absent (no-op).
    pub async fn remove(&self, id: &str) -> Option<S::Entry> {
        let mut state = self.state.write().await;
        let index = state.entries.iter().position(|e| e.entry_id() == id)?;
        let removed = state.entries.remove(index);
        let snapshot = state.entries.clone();
        drop(state);

        let _ = self.entries_tx.send(snapshot);
        let _ = self.events_tx.send(FeedEvent::Removed { id: id.to_string() });
        Some(removed)
    }

    /// Set the pending-requests total
    ///
    /// Negative values are stored as-is (transient states during
    /// reconciliation) but observers see them clamped to 0.
    pub async fn set_pending_total(&self, total: i64) {
        let mut state = self.state.write().await;
        state.pending_requests_total = Some(total);
        drop(state);

        let _ = self.total_tx.send(total.max(0) as u32);
        let _ = self.events_tx.send(FeedEvent::PendingTotalChanged { total });
    }

    /// Re-fetch the full page and atomically replace entries and total
    ///
    /// Observers are notified exactly once per refresh, even when the
    /// fetched data equals the current state.
    pub async fn refresh(&self) -> Result<()> {
        let page = self.source.fetch_page(self.pending).await.map_err(|e| {
            tracing::warn!(pending = self.pending, "inbox refresh failed: {}", e);
            e
        })?;

        let mut state = self.state.write().await;
        state.entries = page.entries;
        state.pending_requests_total = Some(page.pending_requests_total);
        let snapshot = state.entries.clone();
        let count = snapshot.len();
        drop(state);

        let _ = self.entries_tx.send(snapshot);
        let _ = self
            .total_tx
            .send(page.pending_requests_total.max(0) as u32);
        let _ = self.events_tx.send(FeedEvent::Refreshed { count });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEntry {
        id: String,
    }

    impl TestEntry {
        fn new(id: &str) -> Self {
            Self { id: id.to_string() }
        }
    }

    impl InboxEntry for TestEntry {
        fn entry_id(&self) -> &str {
            &self.id
        }
    }

    struct StubSource {
        page: Mutex<InboxPage<TestEntry>>,
        fetch_count: Mutex<usize>,
    }

    impl StubSource {
        fn new(entries: Vec<TestEntry>, total: i64) -> Arc<Self> {
            Arc::new(Self {
                page: Mutex::new(InboxPage {
                    entries,
                    pending_requests_total: total,
                }),
                fetch_count: Mutex::new(0),
            })
        }

        fn fetches(&self) -> usize {
            *self.fetch_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl InboxSource for StubSource {
        type Entry = TestEntry;

        async fn fetch_page(&self, _pending: bool) -> Result<InboxPage<TestEntry>> {
            *self.fetch_count.lock().unwrap() += 1;
            Ok(self.page.lock().unwrap().clone())
        }
    }

    fn feed_with(entries: Vec<TestEntry>, total: i64) -> (InboxFeed<StubSource>, Arc<StubSource>) {
        let source = StubSource::new(entries, total);
        (InboxFeed::new(Arc::clone(&source), false), source)
    }

    #[tokio::test]
    async fn test_feed_starts_empty_and_unloaded() {
        let (feed, _) = feed_with(vec![], 0);
        assert!(feed.is_empty().await);
        assert_eq!(feed.pending_requests_total().await, None);
        assert_eq!(*feed.watch_entries().borrow(), Vec::<TestEntry>::new());
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let (feed, _) = feed_with(vec![], 0);

        assert!(feed.insert(TestEntry::new("a"), 0).await);
        assert!(feed.insert(TestEntry::new("b"), 1).await);
        assert!(feed.insert(TestEntry::new("c"), 1).await);

        let ids: Vec<String> = feed.entries().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let removed = feed.remove("c").await;
        assert_eq!(removed, Some(TestEntry::new("c")));
        assert_eq!(feed.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_out_of_range_is_noop() {
        let (feed, _) = feed_with(vec![], 0);
        assert!(!feed.insert(TestEntry::new("a"), 1).await);
        assert!(feed.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_is_noop() {
        let (feed, _) = feed_with(vec![], 0);
        assert!(feed.insert(TestEntry::new("a"), 0).await);
        assert!(!feed.insert(TestEntry::new("a"), 0).await);
        assert_eq!(feed.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let (feed, _) = feed_with(vec![], 0);
        assert_eq!(feed.remove("ghost").await, None);
    }

    #[tokio::test]
    async fn test_refresh_replaces_entries_and_total() {
        let (feed, source) = feed_with(vec![TestEntry::new("a"), TestEntry::new("b")], 4);

        feed.insert(TestEntry::new("stale"), 0).await;
        feed.refresh().await.unwrap();

        let ids: Vec<String> = feed.entries().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(feed.pending_requests_total().await, Some(4));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_refresh_notifies_even_when_unchanged() {
        let (feed, _) = feed_with(vec![TestEntry::new("a")], 1);
        let mut rx = feed.watch_entries();

        feed.refresh().await.unwrap();
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());

        // Identical page, but observers still tick
        feed.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_refresh_error_propagates() {
        struct FailingSource;

        #[async_trait]
        impl InboxSource for FailingSource {
            type Entry = TestEntry;

            async fn fetch_page(&self, _pending: bool) -> Result<InboxPage<TestEntry>> {
                Err(FeedError::Fetch("connection reset".to_string()))
            }
        }

        let feed = InboxFeed::new(Arc::new(FailingSource), true);
        let err = feed.refresh().await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        // State untouched on failure
        assert_eq!(feed.pending_requests_total().await, None);
    }

    #[tokio::test]
    async fn test_negative_total_clamped_for_observers() {
        let (feed, _) = feed_with(vec![], 0);
        let rx = feed.watch_pending_total();

        feed.set_pending_total(-1).await;

        assert_eq!(feed.pending_requests_total().await, Some(-1));
        assert_eq!(*rx.borrow(), 0);

        feed.set_pending_total(3).await;
        assert_eq!(*rx.borrow(), 3);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (feed, _) = feed_with(vec![], 0);
        let mut rx = feed.subscribe();

        feed.insert(TestEntry::new("a"), 0).await;
        match rx.recv().await.unwrap() {
            FeedEvent::Inserted { id, index } => {
                assert_eq!(id, "a");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        feed.remove("a").await;
        assert!(matches!(rx.recv().await.unwrap(), FeedEvent::Removed { .. }));

        feed.set_pending_total(2).await;
        assert!(matches!(
            rx.recv().await.unwrap(),
            FeedEvent::PendingTotalChanged { total: 2 }
        ));
    }
}
