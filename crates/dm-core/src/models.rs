//! Direct-messaging domain models
//!
//! Value types shared across the inbox feeds, the backend service, and the
//! dispatcher: users, message items, conversation threads, and the ranked
//! recipient targets that outbound shares are addressed to.

use chrono::{DateTime, Utc};
use inbox_state::InboxEntry;
use serde::{Deserialize, Serialize};

/// A user that can participate in conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Numeric user id (non-zero)
    pub pk: u64,
    /// Unique username
    pub username: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Avatar URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
}

impl User {
    /// Create a new user
    pub fn new(pk: u64, username: impl Into<String>) -> Self {
        Self {
            pk,
            username: username.into(),
            full_name: None,
            profile_pic_url: None,
        }
    }
}

/// A single message within a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectItem {
    /// Message id
    pub item_id: String,
    /// Sender's user id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Text content, absent for media-only items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Send time in unix microseconds
    pub timestamp: i64,
}

impl DirectItem {
    /// Create a new item
    pub fn new(item_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: None,
            text: None,
            timestamp,
        }
    }

    /// Send time as a UTC datetime, when the timestamp is representable
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.timestamp)
    }
}

/// A conversation thread
///
/// `items` is ordered newest first; only the most recent item matters for
/// inbox ordering. A thread is owned by exactly one inbox feed at a time:
/// migration between the pending and accepted feeds transfers it, never
/// copies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectThread {
    /// Thread id
    pub thread_id: String,
    /// Optional group title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_title: Option<String>,
    /// Participants (excluding the viewer)
    #[serde(default)]
    pub users: Vec<User>,
    /// Messages, newest first
    #[serde(default)]
    pub items: Vec<DirectItem>,
    /// Whether the thread is still an unaccepted message request
    #[serde(default)]
    pub pending: bool,
}

impl DirectThread {
    /// Create a new thread with no messages
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            thread_title: None,
            users: Vec::new(),
            items: Vec::new(),
            pending: false,
        }
    }

    /// The most recent message, if any
    pub fn first_item(&self) -> Option<&DirectItem> {
        self.items.first()
    }

    /// Timestamp of the most recent message (unix microseconds)
    pub fn last_activity_ts(&self) -> Option<i64> {
        self.first_item().map(|item| item.timestamp)
    }
}

impl InboxEntry for DirectThread {
    fn entry_id(&self) -> &str {
        &self.thread_id
    }
}

/// Dispatch target for an outbound share
///
/// Mirrors the ranked-recipients payload, where either field may be absent:
/// an existing conversation, or a bare user the viewer has no conversation
/// with yet. A thread-bearing recipient ignores `user`; one with neither
/// field is invalid input and fails locally at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedRecipient {
    /// Existing conversation, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<DirectThread>,
    /// Bare user with no conversation yet
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl RankedRecipient {
    /// Recipient backed by an existing thread
    pub fn from_thread(thread: DirectThread) -> Self {
        Self {
            thread: Some(thread),
            user: None,
        }
    }

    /// Recipient backed by a user with no conversation yet
    pub fn from_user(user: User) -> Self {
        Self {
            thread: None,
            user: Some(user),
        }
    }

    /// Whether the recipient can be dispatched to at all
    pub fn is_valid(&self) -> bool {
        self.thread.is_some() || self.user.is_some()
    }
}

/// Destination of a share broadcast: a thread id or recipient user ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendDestination {
    /// An existing thread
    Thread(String),
    /// Users to open a conversation with
    Users(Vec<u64>),
}

impl SendDestination {
    /// Destination for an existing thread
    pub fn thread(thread_id: impl Into<String>) -> Self {
        SendDestination::Thread(thread_id.into())
    }

    /// Destination for a set of users
    pub fn users(user_ids: Vec<u64>) -> Self {
        SendDestination::Users(user_ids)
    }

    /// Wire value for the `thread_ids` field
    pub(crate) fn thread_ids_param(&self) -> Option<String> {
        match self {
            SendDestination::Thread(id) => Some(format!("[{:?}]", id)),
            SendDestination::Users(_) => None,
        }
    }

    /// Wire value for the `recipient_users` field
    pub(crate) fn recipient_users_param(&self) -> Option<String> {
        match self {
            SendDestination::Thread(_) => None,
            // The backend expects one nested group per conversation
            SendDestination::Users(ids) => serde_json::to_string(&vec![ids]).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_first_item_is_most_recent() {
        let mut thread = DirectThread::new("t1");
        assert!(thread.first_item().is_none());
        assert!(thread.last_activity_ts().is_none());

        thread.items.push(DirectItem::new("m2", 200));
        thread.items.push(DirectItem::new("m1", 100));

        assert_eq!(thread.first_item().unwrap().item_id, "m2");
        assert_eq!(thread.last_activity_ts(), Some(200));
    }

    #[test]
    fn test_item_sent_at() {
        let item = DirectItem::new("m1", 1_700_000_000_000_000);
        let sent_at = item.sent_at().unwrap();
        assert_eq!(sent_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_recipient_validity() {
        let from_thread = RankedRecipient::from_thread(DirectThread::new("t1"));
        assert!(from_thread.is_valid());

        let from_user = RankedRecipient::from_user(User::new(9, "ada"));
        assert!(from_user.is_valid());

        let neither = RankedRecipient {
            thread: None,
            user: None,
        };
        assert!(!neither.is_valid());
    }

    #[test]
    fn test_send_destination_params() {
        let to_thread = SendDestination::thread("t1");
        assert_eq!(to_thread.thread_ids_param(), Some("[\"t1\"]".to_string()));
        assert_eq!(to_thread.recipient_users_param(), None);

        let to_users = SendDestination::users(vec![3, 7]);
        assert_eq!(to_users.thread_ids_param(), None);
        assert_eq!(to_users.recipient_users_param(), Some("[[3,7]]".to_string()));
    }

    #[test]
    fn test_thread_deserializes_with_defaults() {
        let thread: DirectThread =
            serde_json::from_str(r#"{"threadId": "t1"}"#).unwrap();
        assert_eq!(thread.thread_id, "t1");
        assert!(thread.items.is_empty());
        assert!(!thread.pending);
    }
}
