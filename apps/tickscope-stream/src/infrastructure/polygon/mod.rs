//! Polygon WebSocket Adapters
//!
//! Streaming clients for Polygon's stocks and options clusters. Both speak
//! the same JSON protocol; the asset class only changes the endpoint, the
//! topic prefix (`O:` for options) and the channels events are routed to.

pub mod auth;
pub mod codec;
pub mod feed;
pub mod messages;
pub mod reconnect;

pub use auth::{AUTH_TIMEOUT, ApiKey, AuthError, AuthHandler, AuthState};
pub use codec::{CodecError, JsonCodec};
pub use feed::{
    FeedClient, FeedConfig, FeedConnectionState, FeedError, FeedHandle, FeedState,
    normalize_symbol,
};
pub use messages::{Action, ControlRequest, StatusKind, StatusMessage, Topics};
pub use reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
