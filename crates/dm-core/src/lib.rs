//! Core direct-messaging logic for Grapevine
//!
//! This crate ties the transport and state layers together: domain models
//! for threads and recipients, the typed backend service, pending-thread
//! migration, and fan-out share dispatch.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod models;
pub mod resource;
pub mod service;

pub use manager::{BatchOutcome, DirectInboxSource, DirectMessagesManager};
pub use models::{DirectItem, DirectThread, RankedRecipient, SendDestination, User};
pub use resource::Resource;
pub use service::{DirectApi, DirectError, DirectService, InboxResponse};
