//! Authenticated session context
//!
//! The messaging core is only meaningful with an authenticated identity.
//! `SessionContext` is constructed exactly once at startup from the stored
//! login cookie and passed explicitly into every component that needs it.
//! Construction failure is a startup precondition violation: callers must
//! not build any other part of the core without a valid context.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while constructing the session context
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No login cookie is stored
    #[error("no stored login cookie; user is not logged in")]
    MissingCookie,

    /// A required session field is missing or blank
    #[error("session field missing or blank: {0}")]
    MissingField(&'static str),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Access to the persisted credential store
///
/// Implemented by whatever settings layer the embedding application uses.
pub trait SessionStore: Send + Sync {
    /// The raw session cookie, if a login is stored
    fn cookie(&self) -> Option<String>;

    /// The device identifier assigned at first launch
    fn device_uuid(&self) -> Option<String>;
}

/// In-memory session store
///
/// Useful for tests and for applications that manage credentials themselves.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    /// Stored cookie value
    pub cookie: Option<String>,
    /// Stored device identifier
    pub device_uuid: Option<String>,
}

impl SessionStore for MemorySessionStore {
    fn cookie(&self) -> Option<String> {
        self.cookie.clone()
    }

    fn device_uuid(&self) -> Option<String> {
        self.device_uuid.clone()
    }
}

/// Extract a named value from a semicolon-separated cookie string
fn cookie_value(cookie: &str, name: &str) -> Option<String> {
    cookie.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Extract the viewer's user id from the session cookie
///
/// Returns `None` when the field is absent or not a valid id.
pub fn viewer_id_from_cookie(cookie: &str) -> Option<u64> {
    cookie_value(cookie, "user_id")?.parse().ok()
}

/// Extract the anti-forgery token from the session cookie
pub fn csrf_token_from_cookie(cookie: &str) -> Option<String> {
    cookie_value(cookie, "csrftoken")
}

/// Immutable authenticated identity
///
/// Holds the viewer id, device identifier, and anti-forgery token required
/// by the transport layer to authorize mutating requests. All fields are
/// validated at construction; the struct never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    viewer_id: u64,
    device_uuid: String,
    csrf_token: String,
}

impl SessionContext {
    /// Build the context from a raw cookie and device identifier
    ///
    /// Fails when the viewer id is zero or missing, or when either token is
    /// blank. This is a fatal precondition: no messaging operation can run
    /// without an authenticated identity.
    pub fn from_parts(cookie: &str, device_uuid: impl Into<String>) -> Result<Self> {
        let viewer_id =
            viewer_id_from_cookie(cookie).ok_or(SessionError::MissingField("user_id"))?;
        if viewer_id == 0 {
            return Err(SessionError::MissingField("user_id"));
        }

        let csrf_token =
            csrf_token_from_cookie(cookie).ok_or(SessionError::MissingField("csrftoken"))?;

        let device_uuid = device_uuid.into();
        if device_uuid.trim().is_empty() {
            return Err(SessionError::MissingField("device_uuid"));
        }

        Ok(Self {
            viewer_id,
            device_uuid,
            csrf_token,
        })
    }

    /// Build the context from the persisted credential store
    pub fn from_store(store: &dyn SessionStore) -> Result<Self> {
        let cookie = store.cookie().ok_or(SessionError::MissingCookie)?;
        let device_uuid = store
            .device_uuid()
            .ok_or(SessionError::MissingField("device_uuid"))?;
        Self::from_parts(&cookie, device_uuid)
    }

    /// The viewer's user id (always non-zero)
    pub fn viewer_id(&self) -> u64 {
        self.viewer_id
    }

    /// The device identifier
    pub fn device_uuid(&self) -> &str {
        &self.device_uuid
    }

    /// The anti-forgery token
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOKIE: &str = "user_id=4412; csrftoken=tok123; sessionid=abcdef";

    #[test]
    fn test_viewer_id_from_cookie() {
        assert_eq!(viewer_id_from_cookie(COOKIE), Some(4412));
        assert_eq!(viewer_id_from_cookie("csrftoken=tok123"), None);
        assert_eq!(viewer_id_from_cookie("user_id=notanumber"), None);
        assert_eq!(viewer_id_from_cookie("user_id="), None);
    }

    #[test]
    fn test_csrf_token_from_cookie() {
        assert_eq!(csrf_token_from_cookie(COOKIE), Some("tok123".to_string()));
        assert_eq!(csrf_token_from_cookie("user_id=4412"), None);
        assert_eq!(csrf_token_from_cookie("csrftoken="), None);
    }

    #[test]
    fn test_context_from_parts() {
        let ctx = SessionContext::from_parts(COOKIE, "device-1").unwrap();
        assert_eq!(ctx.viewer_id(), 4412);
        assert_eq!(ctx.device_uuid(), "device-1");
        assert_eq!(ctx.csrf_token(), "tok123");
    }

    #[test]
    fn test_context_rejects_missing_fields() {
        assert_eq!(
            SessionContext::from_parts("csrftoken=tok123", "device-1"),
            Err(SessionError::MissingField("user_id"))
        );
        assert_eq!(
            SessionContext::from_parts("user_id=0; csrftoken=tok123", "device-1"),
            Err(SessionError::MissingField("user_id"))
        );
        assert_eq!(
            SessionContext::from_parts("user_id=4412", "device-1"),
            Err(SessionError::MissingField("csrftoken"))
        );
        assert_eq!(
            SessionContext::from_parts(COOKIE, "  "),
            Err(SessionError::MissingField("device_uuid"))
        );
    }

    #[test]
    fn test_context_from_store() {
        let store = MemorySessionStore {
            cookie: Some(COOKIE.to_string()),
            device_uuid: Some("device-1".to_string()),
        };
        let ctx = SessionContext::from_store(&store).unwrap();
        assert_eq!(ctx.viewer_id(), 4412);

        let empty = MemorySessionStore::default();
        assert_eq!(
            SessionContext::from_store(&empty),
            Err(SessionError::MissingCookie)
        );
    }
}
