//! Polygon WebSocket Message Types
//!
//! Control frames sent to the server and the status frames it answers with.
//! Market events (`ev` = `T` / `Q`) are left as raw JSON values and handed
//! to the domain classifier.
//!
//! # Control Frames
//!
//! ```json
//! {"action":"auth","params":"<api key>"}
//! {"action":"subscribe","params":"T.TSLA,Q.TSLA"}
//! {"action":"unsubscribe","params":"T.O:TSLA240315C00220000,Q.O:TSLA240315C00220000"}
//! ```
//!
//! # Status Frames
//!
//! ```json
//! [{"ev":"status","status":"connected","message":"Connected Successfully"}]
//! [{"ev":"status","status":"auth_success","message":"authenticated"}]
//! [{"ev":"status","status":"auth_failed","message":"authentication failed"}]
//! [{"ev":"status","status":"success","message":"subscribed to: T.TSLA"}]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::classifier::OPTION_SYMBOL_PREFIX;
use crate::domain::event::{EventKind, SymbolClass};

// =============================================================================
// Outbound Control Frames
// =============================================================================

/// Control frame action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Authenticate the connection.
    Auth,
    /// Start receiving topics.
    Subscribe,
    /// Stop receiving topics.
    Unsubscribe,
}

/// Outbound control frame.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    /// Requested action.
    pub action: Action,
    /// API key for `auth`, comma-separated topics otherwise.
    pub params: String,
}

impl ControlRequest {
    /// Authentication frame.
    #[must_use]
    pub fn auth(api_key: &str) -> Self {
        Self {
            action: Action::Auth,
            params: api_key.to_string(),
        }
    }

    /// Subscribe frame for a set of topics.
    #[must_use]
    pub fn subscribe(topics: &Topics) -> Self {
        Self {
            action: Action::Subscribe,
            params: topics.params(),
        }
    }

    /// Unsubscribe frame for a set of topics.
    #[must_use]
    pub fn unsubscribe(topics: &Topics) -> Self {
        Self {
            action: Action::Unsubscribe,
            params: topics.params(),
        }
    }
}

impl fmt::Debug for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: &dyn fmt::Debug = match self.action {
            Action::Auth => &"[REDACTED]",
            Action::Subscribe | Action::Unsubscribe => &self.params,
        };
        f.debug_struct("ControlRequest")
            .field("action", &self.action)
            .field("params", params)
            .finish()
    }
}

/// The topics subscribed for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    symbol_class: SymbolClass,
    symbol: String,
    include_quotes: bool,
}

impl Topics {
    /// Topics for `symbol`: trades, plus quotes when `include_quotes`.
    #[must_use]
    pub fn new(symbol_class: SymbolClass, symbol: impl Into<String>, include_quotes: bool) -> Self {
        Self {
            symbol_class,
            symbol: symbol.into(),
            include_quotes,
        }
    }

    /// Symbol the topics refer to.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Event kinds covered.
    #[must_use]
    pub fn event_kinds(&self) -> &'static [EventKind] {
        if self.include_quotes {
            &[EventKind::Trade, EventKind::Quote]
        } else {
            &[EventKind::Trade]
        }
    }

    /// Wire params, e.g. `T.TSLA,Q.TSLA`.
    #[must_use]
    pub fn params(&self) -> String {
        let wire_symbol = match self.symbol_class {
            SymbolClass::Equity => self.symbol.clone(),
            SymbolClass::Option => format!("{OPTION_SYMBOL_PREFIX}{}", self.symbol),
        };

        self.event_kinds()
            .iter()
            .map(|kind| format!("{}.{wire_symbol}", kind.wire_prefix()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

// =============================================================================
// Inbound Status Frames
// =============================================================================

/// Meaning of a status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Socket accepted, authentication expected.
    Connected,
    /// Key accepted.
    AuthSuccess,
    /// Key rejected.
    AuthFailed,
    /// Subscribe/unsubscribe acknowledged.
    Success,
    /// Server-side error.
    Error,
    /// Too many connections for this key.
    MaxConnections,
    /// Anything else.
    Other,
}

/// A `{"ev":"status"}` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    /// Raw status string.
    pub status: String,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

impl StatusMessage {
    /// Parse a status frame, `None` for any other message.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("ev").and_then(Value::as_str) != Some("status") {
            return None;
        }
        Self::deserialize(value).ok()
    }

    /// Classified status.
    #[must_use]
    pub fn kind(&self) -> StatusKind {
        match self.status.as_str() {
            "connected" => StatusKind::Connected,
            "auth_success" => StatusKind::AuthSuccess,
            "auth_failed" => StatusKind::AuthFailed,
            "success" => StatusKind::Success,
            "error" => StatusKind::Error,
            "max_connections" => StatusKind::MaxConnections,
            _ => StatusKind::Other,
        }
    }
}
