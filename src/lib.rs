//! Grapevine direct-messaging client core
//!
//! Facade over the workspace crates: the REST transport and session context
//! ([`direct_client`]), the observable inbox collections ([`inbox_state`]),
//! and the messaging manager with migration and fan-out dispatch
//! ([`dm_core`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use direct_client;
pub use dm_core;
pub use inbox_state;
