//! Observable inbox collections for the Grapevine messaging core
//!
//! This crate provides the reactive ordered collection that backs both the
//! accepted and pending inbox views: serialized mutation, snapshot watching,
//! and typed change events.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod feed;

pub use feed::{FeedError, FeedEvent, InboxEntry, InboxFeed, InboxPage, InboxSource};
