//! Polygon WebSocket Authentication
//!
//! # Authentication Flow
//!
//! 1. Connect to the cluster endpoint (`/stocks`, `/options`)
//! 2. Send `{"action":"auth","params":"<key>"}`
//! 3. Skip informational frames (`connected`, stray market data)
//! 4. Receive `auth_success` or `auth_failed`
//!
//! Only an explicit `auth_success` counts as authenticated. An explicit
//! `auth_failed` is terminal: retrying with the same key cannot succeed.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::messages::{ControlRequest, StatusKind, StatusMessage};

// =============================================================================
// Constants
// =============================================================================

/// Default time allowed between connecting and `auth_success`.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No API key configured.
    #[error("API key cannot be empty")]
    EmptyKey,

    /// Server rejected the key.
    #[error("authentication failed: {0}")]
    Rejected(String),

    /// Server refused the connection (connection limit, server error).
    #[error("server refused connection: {0}")]
    Refused(String),

    /// No verdict within the allowed time.
    #[error("authentication timed out after {0:?}")]
    Timeout(Duration),
}

impl AuthError {
    /// True when retrying with the same key is pointless.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EmptyKey | Self::Rejected(_))
    }
}

// =============================================================================
// Authentication State
// =============================================================================

/// Current state of authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not yet connected.
    #[default]
    Disconnected,

    /// Server announced the connection.
    Connected,

    /// Auth frame sent, awaiting verdict.
    Authenticating,

    /// Key accepted.
    Authenticated,

    /// Key rejected or connection refused.
    Failed,
}

impl AuthState {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

// =============================================================================
// API Key
// =============================================================================

/// Opaque Polygon API key. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyKey`] for an empty or blank key.
    pub fn new(key: impl Into<String>) -> Result<Self, AuthError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(AuthError::EmptyKey);
        }
        Ok(Self(key))
    }

    /// The raw key, for building the auth frame.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Tracks the authentication handshake, reset for every connection.
#[derive(Debug)]
pub struct AuthHandler {
    key: ApiKey,
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler in the initial state.
    #[must_use]
    pub const fn new(key: ApiKey) -> Self {
        Self {
            key,
            state: AuthState::Disconnected,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Build the auth frame and mark the handshake as in flight.
    pub fn create_auth_request(&mut self) -> ControlRequest {
        self.state = AuthState::Authenticating;
        ControlRequest::auth(self.key.expose())
    }

    /// Feed a status frame into the handshake.
    ///
    /// Returns `Ok(true)` exactly when the frame completes authentication.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] on `auth_failed` and
    /// [`AuthError::Refused`] on connection-level refusals received before
    /// authentication completed.
    pub fn on_status(&mut self, status: &StatusMessage) -> Result<bool, AuthError> {
        match status.kind() {
            StatusKind::Connected => {
                if self.state == AuthState::Disconnected {
                    self.state = AuthState::Connected;
                }
                Ok(false)
            }
            StatusKind::AuthSuccess => {
                self.state = AuthState::Authenticated;
                Ok(true)
            }
            StatusKind::AuthFailed => {
                self.state = AuthState::Failed;
                Err(AuthError::Rejected(status.message.clone()))
            }
            StatusKind::MaxConnections | StatusKind::Error if !self.state.is_authenticated() => {
                self.state = AuthState::Failed;
                Err(AuthError::Refused(status.message.clone()))
            }
            _ => Ok(false),
        }
    }

    /// Return to the initial state for a new connection.
    pub const fn reset(&mut self) {
        self.state = AuthState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::polygon::messages::Action;

    fn status(status: &str, message: &str) -> StatusMessage {
        StatusMessage {
            status: status.to_string(),
            message: message.to_string(),
        }
    }

    fn handler() -> AuthHandler {
        AuthHandler::new(ApiKey::new("test-key").unwrap())
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(ApiKey::new("  ").unwrap_err(), AuthError::EmptyKey);
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = ApiKey::new("super-secret").unwrap();
        assert!(!format!("{key:?}").contains("super-secret"));
        assert_eq!(key.expose(), "super-secret");
    }

    #[test]
    fn test_full_handshake() {
        let mut auth = handler();

        assert!(!auth.on_status(&status("connected", "Connected Successfully")).unwrap());
        assert_eq!(auth.state(), AuthState::Connected);

        let request = auth.create_auth_request();
        assert_eq!(request.action, Action::Auth);
        assert_eq!(request.params, "test-key");
        assert_eq!(auth.state(), AuthState::Authenticating);

        assert!(auth.on_status(&status("auth_success", "authenticated")).unwrap());
        assert!(auth.state().is_authenticated());
    }

    #[test]
    fn test_auth_sent_before_connected_status() {
        let mut auth = handler();
        let _ = auth.create_auth_request();

        assert!(!auth.on_status(&status("connected", "")).unwrap());
        assert_eq!(auth.state(), AuthState::Authenticating);
        assert!(auth.on_status(&status("auth_success", "")).unwrap());
    }

    #[test]
    fn test_auth_failed_is_terminal() {
        let mut auth = handler();
        let _ = auth.create_auth_request();

        let err = auth.on_status(&status("auth_failed", "authentication failed")).unwrap_err();
        assert_eq!(err, AuthError::Rejected("authentication failed".into()));
        assert!(err.is_terminal());
        assert_eq!(auth.state(), AuthState::Failed);
    }

    #[test]
    fn test_max_connections_refused() {
        let mut auth = handler();
        let _ = auth.create_auth_request();

        let err = auth.on_status(&status("max_connections", "Maximum number of connections exceeded.")).unwrap_err();
        assert!(matches!(err, AuthError::Refused(_)));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_error_after_auth_ignored() {
        let mut auth = handler();
        let _ = auth.create_auth_request();
        auth.on_status(&status("auth_success", "")).unwrap();

        assert!(!auth.on_status(&status("error", "bad params")).unwrap());
        assert!(auth.state().is_authenticated());
    }

    #[test]
    fn test_subscription_ack_does_not_authenticate() {
        let mut auth = handler();
        let _ = auth.create_auth_request();

        assert!(!auth.on_status(&status("success", "subscribed to: T.TSLA")).unwrap());
        assert!(!auth.state().is_authenticated());
    }

    #[test]
    fn test_reset_allows_next_handshake() {
        let mut auth = handler();
        let _ = auth.create_auth_request();
        auth.on_status(&status("auth_success", "")).unwrap();
        auth.reset();

        assert_eq!(auth.state(), AuthState::Disconnected);
        // Refusals count again until the new connection authenticates.
        let _ = auth.create_auth_request();
        assert!(auth.on_status(&status("max_connections", "")).is_err());
        assert!(AuthError::Timeout(AUTH_TIMEOUT).to_string().contains("timed out"));
    }
}
