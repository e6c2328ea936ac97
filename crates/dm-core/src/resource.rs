//! Three-state async operation result
//!
//! A send operation is observable from the moment it is dispatched:
//! `Loading` is published synchronously before any network I/O, then the
//! value resolves exactly once to `Success` or `Error` and is never
//! revisited.

/// State of an in-flight asynchronous operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource<T> {
    /// The operation has been dispatched and has not yet completed
    Loading,
    /// The operation completed successfully
    Success(T),
    /// The operation failed with a diagnostic message
    Error(String),
}

impl<T> Resource<T> {
    /// Whether the operation is still in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    /// Whether the operation completed successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Resource::Success(_))
    }

    /// Whether the operation failed
    pub fn is_error(&self) -> bool {
        matches!(self, Resource::Error(_))
    }

    /// Whether the operation has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        !self.is_loading()
    }

    /// The error message, when the operation failed
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Resource::Error(message) => Some(message),
            _ => None,
        }
    }

    /// The success value, when the operation completed
    pub fn value(&self) -> Option<&T> {
        match self {
            Resource::Success(value) => Some(value),
            _ => None,
        }
    }
}
