//! Polygon Feed Client
//!
//! Connects to one Polygon cluster (stocks or options), authenticates,
//! subscribes to the active symbol and routes classified events into the
//! feed's channels.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Authenticating -> Subscribed -> Receiving
//!                                                                 |  ^
//!                                               symbol change     v  |
//!                                                            Resubscribing
//! ```
//!
//! Closed or stale connections go back to `Disconnected` and reconnect with
//! exponential backoff. A rejected API key ends the feed.
//!
//! # Symbol Changes
//!
//! The active symbol lives in a `watch` channel shared with every
//! [`FeedHandle`]. Only the feed task sends subscribe and unsubscribe frames,
//! so rapid changes coalesce into the latest value and at most one
//! unsubscribe/subscribe pair goes out per change it observes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use super::auth::{ApiKey, AuthError, AuthHandler};
use super::codec::{CodecError, JsonCodec};
use super::messages::{ControlRequest, StatusKind, StatusMessage, Topics};
use super::reconnect::{ReconnectConfig, ReconnectError, ReconnectPolicy};
use crate::application::services::registry::{
    ChannelRegistry, RouteOutcome, channel_name, series_kinds_for,
};
use crate::domain::classifier::MessageClassifier;
use crate::domain::event::{EventKind, SymbolClass};
use crate::domain::ticker::{OptionContract, TickerError};
use crate::infrastructure::config::{ConnectionSettings, FeedSettings};
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in a feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Server rejected the API key.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Handshake failed for another reason.
    #[error("authentication error: {0}")]
    Auth(AuthError),

    /// No authentication verdict in time.
    #[error("authentication timed out after {0:?}")]
    AuthTimeout(Duration),

    /// Control frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Nothing received within the idle timeout.
    #[error("no data received for {0:?}")]
    Stale(Duration),

    /// Reconnection attempts exhausted.
    #[error(transparent)]
    MaxReconnectAttemptsExceeded(#[from] ReconnectError),

    /// Empty symbol.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Option symbol is not a valid OCC contract.
    #[error("invalid option symbol: {0}")]
    InvalidSymbol(#[from] TickerError),

    /// Connection tuning the feed cannot run with.
    #[error("invalid feed configuration: {0}")]
    InvalidConfig(String),
}

impl From<AuthError> for FeedError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(message) => Self::AuthFailed(message),
            AuthError::Timeout(after) => Self::AuthTimeout(after),
            other => Self::Auth(other),
        }
    }
}

impl FeedError {
    /// True when reconnecting cannot help.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::AuthFailed(_)
            | Self::MaxReconnectAttemptsExceeded(_)
            | Self::InvalidConfig(_) => true,
            Self::Auth(err) => err.is_terminal(),
            _ => false,
        }
    }

    const fn metric_label(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::AuthFailed(_) | Self::Auth(_) => "auth",
            Self::AuthTimeout(_) => "auth_timeout",
            Self::Codec(_) => "codec",
            Self::ConnectionClosed => "closed",
            Self::Stale(_) => "stale",
            Self::MaxReconnectAttemptsExceeded(_) => "max_reconnects",
            Self::EmptySymbol | Self::InvalidSymbol(_) => "symbol",
            Self::InvalidConfig(_) => "config",
        }
    }
}

// =============================================================================
// Feed State
// =============================================================================

/// Connection state of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Opening the WebSocket.
    Connecting,
    /// Waiting for `auth_success`.
    Authenticating,
    /// Subscribe frame sent.
    Subscribed,
    /// Routing market events.
    Receiving,
    /// Swapping the subscription to a new symbol.
    Resubscribing,
    /// Stopped after a terminal error.
    Failed,
}

impl FeedConnectionState {
    /// True while authenticated and subscribed.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Subscribed | Self::Receiving | Self::Resubscribing)
    }
}

/// Observable state of a feed, shared with its handles.
#[derive(Debug)]
pub struct FeedState {
    symbol_class: SymbolClass,
    state: parking_lot::RwLock<FeedConnectionState>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    error_message: parking_lot::RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
}

impl FeedState {
    const fn new(symbol_class: SymbolClass) -> Self {
        Self {
            symbol_class,
            state: parking_lot::RwLock::new(FeedConnectionState::Disconnected),
            last_connected_at: parking_lot::RwLock::new(None),
            error_message: parking_lot::RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    /// Set the connection state.
    pub fn set_state(&self, state: FeedConnectionState) {
        *self.state.write() = state;
        if state == FeedConnectionState::Subscribed {
            *self.last_connected_at.write() = Some(Utc::now());
            self.reconnect_attempts.store(0, Ordering::Relaxed);
            *self.error_message.write() = None;
        }
        metrics::set_feed_connected(self.symbol_class, state.is_live());
    }

    /// Record an error and move to `state`.
    pub fn set_error(&self, state: FeedConnectionState, message: String) {
        *self.error_message.write() = Some(message);
        self.set_state(state);
    }

    fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Asset class of the feed.
    #[must_use]
    pub const fn symbol_class(&self) -> SymbolClass {
        self.symbol_class
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> FeedConnectionState {
        *self.state.read()
    }

    /// When the feed last subscribed successfully.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Most recent error, cleared on the next successful subscribe.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.error_message.read().clone()
    }

    /// Reconnect attempts since the last successful subscribe.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Text frames received over the feed's lifetime.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Asset class; selects channels and topic prefix.
    pub symbol_class: SymbolClass,
    /// WebSocket URL.
    pub url: String,
    /// Polygon API key.
    pub api_key: ApiKey,
    /// Symbol subscribed on first connect.
    pub symbol: String,
    /// Subscribe to quotes as well as trades.
    pub include_quotes: bool,
    /// Reconnection backoff.
    pub reconnect: ReconnectConfig,
    /// Time allowed for the auth handshake.
    pub auth_timeout: Duration,
    /// Interval between client pings.
    pub ping_interval: Duration,
    /// Silence after which the connection is dropped.
    pub idle_timeout: Duration,
    /// Reset the feed's series when the subscribed symbol changes.
    pub reset_on_symbol_change: bool,
}

impl FeedConfig {
    /// Create a configuration with default connection tuning.
    #[must_use]
    pub fn new(
        symbol_class: SymbolClass,
        url: impl Into<String>,
        api_key: ApiKey,
        symbol: impl Into<String>,
    ) -> Self {
        let connection = ConnectionSettings::default();
        Self {
            symbol_class,
            url: url.into(),
            api_key,
            symbol: symbol.into(),
            include_quotes: true,
            reconnect: ReconnectConfig::from_settings(&connection),
            auth_timeout: connection.auth_timeout,
            ping_interval: connection.ping_interval,
            idle_timeout: connection.idle_timeout,
            reset_on_symbol_change: true,
        }
    }

    /// Build from loaded settings.
    #[must_use]
    pub fn from_settings(
        feed: &FeedSettings,
        api_key: ApiKey,
        include_quotes: bool,
        connection: &ConnectionSettings,
    ) -> Self {
        Self {
            include_quotes,
            reconnect: ReconnectConfig::from_settings(connection),
            auth_timeout: connection.auth_timeout,
            ping_interval: connection.ping_interval,
            idle_timeout: connection.idle_timeout,
            ..Self::new(feed.symbol_class, feed.url.clone(), api_key, feed.symbol.clone())
        }
    }

    /// Check the liveness timers.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidConfig`] if the ping interval is zero or
    /// the idle timeout does not exceed it.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.ping_interval.is_zero() {
            return Err(FeedError::InvalidConfig("ping interval must be non-zero".into()));
        }
        if self.idle_timeout <= self.ping_interval {
            return Err(FeedError::InvalidConfig(format!(
                "idle timeout {:?} must exceed ping interval {:?}",
                self.idle_timeout, self.ping_interval
            )));
        }
        Ok(())
    }
}

/// Normalise a user-entered symbol for a feed.
///
/// Equity tickers are upper-cased; option symbols must be valid OCC
/// contracts.
///
/// # Errors
///
/// Returns an error for an empty symbol or an invalid option contract.
pub fn normalize_symbol(symbol_class: SymbolClass, raw: &str) -> Result<String, FeedError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FeedError::EmptySymbol);
    }
    match symbol_class {
        SymbolClass::Equity => Ok(trimmed.to_ascii_uppercase()),
        SymbolClass::Option => Ok(OptionContract::parse(trimmed)?.occ_symbol()),
    }
}

// =============================================================================
// Feed Handle
// =============================================================================

/// Cloneable control surface for a running feed.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    symbol_class: SymbolClass,
    symbol_tx: Arc<watch::Sender<String>>,
    state: Arc<FeedState>,
}

impl FeedHandle {
    /// Switch the feed to a new symbol.
    ///
    /// Returns `Ok(false)` when the symbol is already active. When the feed
    /// is connected it unsubscribes the old symbol and subscribes the new
    /// one; otherwise the next connection subscribes to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is empty or, for option feeds, not a
    /// valid OCC contract.
    pub fn change_symbol(&self, symbol: &str) -> Result<bool, FeedError> {
        let next = normalize_symbol(self.symbol_class, symbol)?;
        let changed = self.symbol_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                current.clone_from(&next);
                true
            }
        });

        if changed {
            tracing::info!(feed = self.symbol_class.as_str(), symbol = %next, "Symbol change requested");
        }
        Ok(changed)
    }

    /// Symbol the feed is (or will be) subscribed to.
    #[must_use]
    pub fn active_symbol(&self) -> String {
        self.symbol_tx.borrow().clone()
    }

    /// Shared feed state.
    #[must_use]
    pub fn state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state)
    }

    /// Asset class of the feed.
    #[must_use]
    pub const fn symbol_class(&self) -> SymbolClass {
        self.symbol_class
    }
}

// =============================================================================
// Feed Client
// =============================================================================

/// WebSocket client for one Polygon cluster.
pub struct FeedClient {
    config: FeedConfig,
    codec: JsonCodec,
    classifier: MessageClassifier,
    registry: Arc<ChannelRegistry>,
    cancel: CancellationToken,
    state: Arc<FeedState>,
    auth: AuthHandler,
    symbol_rx: watch::Receiver<String>,
    // Keeps `changed()` from erroring once every handle is dropped.
    _symbol_tx: Arc<watch::Sender<String>>,
    trade_channels: Vec<String>,
    quote_channels: Vec<String>,
    subscribed: Option<String>,
}

impl FeedClient {
    /// Create a feed and its control handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured symbol is invalid for the feed or
    /// the liveness timers are unusable.
    pub fn new(
        config: FeedConfig,
        registry: Arc<ChannelRegistry>,
        cancel: CancellationToken,
    ) -> Result<(Self, FeedHandle), FeedError> {
        config.validate()?;
        let class = config.symbol_class;
        let symbol = normalize_symbol(class, &config.symbol)?;
        let (symbol_tx, symbol_rx) = watch::channel(symbol);
        let symbol_tx = Arc::new(symbol_tx);
        let state = Arc::new(FeedState::new(class));

        let channels_for = |kind: EventKind| -> Vec<String> {
            series_kinds_for(kind)
                .iter()
                .map(|series| channel_name(class, *series))
                .collect()
        };

        let handle = FeedHandle {
            symbol_class: class,
            symbol_tx: Arc::clone(&symbol_tx),
            state: Arc::clone(&state),
        };

        let client = Self {
            codec: JsonCodec::new(),
            classifier: MessageClassifier::new(class),
            registry,
            cancel,
            state,
            auth: AuthHandler::new(config.api_key.clone()),
            symbol_rx,
            _symbol_tx: symbol_tx,
            trade_channels: channels_for(EventKind::Trade),
            quote_channels: channels_for(EventKind::Quote),
            subscribed: None,
            config,
        };

        Ok((client, handle))
    }

    const fn feed(&self) -> &'static str {
        self.config.symbol_class.as_str()
    }

    /// Run the connection loop until cancelled or a terminal error.
    ///
    /// # Errors
    ///
    /// Returns an error when the API key is rejected or reconnection
    /// attempts are exhausted.
    pub async fn run(mut self) -> Result<(), FeedError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(feed = self.feed(), "Feed cancelled");
                self.state.set_state(FeedConnectionState::Disconnected);
                return Ok(());
            }

            match self.connect_and_run(&mut policy).await {
                Ok(()) => {
                    tracing::info!(feed = self.feed(), "Feed closed gracefully");
                    self.state.set_state(FeedConnectionState::Disconnected);
                    return Ok(());
                }
                Err(e) if e.is_terminal() => {
                    tracing::error!(feed = self.feed(), error = %e, "Feed stopped");
                    metrics::record_websocket_error(self.config.symbol_class, e.metric_label());
                    self.state
                        .set_error(FeedConnectionState::Failed, e.to_string());
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(feed = self.feed(), error = %e, "Feed connection error");
                    metrics::record_websocket_error(self.config.symbol_class, e.metric_label());
                    self.state
                        .set_error(FeedConnectionState::Disconnected, e.to_string());

                    let Some(delay) = policy.next_delay() else {
                        let err = FeedError::from(ReconnectError::MaxAttemptsExceeded(
                            policy.attempt_count(),
                        ));
                        self.state.set_error(FeedConnectionState::Failed, err.to_string());
                        return Err(err);
                    };

                    let attempt = policy.attempt_count();
                    self.state.increment_reconnect_attempts();
                    metrics::record_reconnect(self.config.symbol_class);
                    tracing::info!(
                        feed = self.feed(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!(feed = self.feed(), "Feed cancelled during reconnect delay");
                            self.state.set_state(FeedConnectionState::Disconnected);
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect, authenticate, subscribe and receive until error or cancellation.
    async fn connect_and_run(&mut self, policy: &mut ReconnectPolicy) -> Result<(), FeedError> {
        self.state.set_state(FeedConnectionState::Connecting);
        tracing::info!(feed = self.feed(), url = %self.config.url, "Connecting");

        let cancel = self.cancel.clone();
        let (ws_stream, _response) = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            connected = tokio_tungstenite::connect_async(self.config.url.as_str()) => connected?,
        };
        let (mut write, mut read) = ws_stream.split();

        // Authenticate
        self.state.set_state(FeedConnectionState::Authenticating);
        self.auth.reset();
        let request = self.auth.create_auth_request();
        self.send_control(&mut write, &request).await?;

        let auth_timeout = self.config.auth_timeout;
        let verdict = tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            verdict = tokio::time::timeout(
                auth_timeout,
                self.authenticate(&mut read, &mut write),
            ) => verdict,
        };
        match verdict {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if matches!(e, FeedError::AuthFailed(_) | FeedError::Auth(_)) {
                    metrics::record_auth_failure(self.config.symbol_class);
                }
                return Err(e);
            }
            Err(_elapsed) => {
                tracing::debug!(feed = self.feed(), auth_state = ?self.auth.state(), "No auth verdict");
                return Err(AuthError::Timeout(auth_timeout).into());
            }
        }
        tracing::info!(feed = self.feed(), "Authenticated");
        policy.reset();

        // Subscribe
        let symbol = self.symbol_rx.borrow_and_update().clone();
        self.subscribe(&mut write, symbol).await?;
        self.state.set_state(FeedConnectionState::Receiving);

        // Receive
        let idle_timeout = self.config.idle_timeout;
        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                changed = self.symbol_rx.changed() => {
                    if changed.is_ok() {
                        let next = self.symbol_rx.borrow_and_update().clone();
                        self.resubscribe(&mut write, next).await?;
                    }
                }
                _ = ping.tick() => {
                    if last_seen.elapsed() >= idle_timeout {
                        return Err(FeedError::Stale(idle_timeout));
                    }
                    write.send(Message::Ping(Vec::new().into())).await?;
                }
                msg = read.next() => {
                    last_seen = Instant::now();
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(feed = self.feed(), "Server sent close frame");
                            return Err(FeedError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!(feed = self.feed(), "WebSocket stream ended");
                            return Err(FeedError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Read frames until the handshake completes.
    ///
    /// Informational status frames and early market data are skipped.
    async fn authenticate<R, W>(&mut self, read: &mut R, write: &mut W) -> Result<(), FeedError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let messages = match self.codec.decode(&text) {
                        Ok(messages) => messages,
                        Err(e) => {
                            tracing::warn!(feed = self.feed(), error = %e, "Undecodable frame during auth");
                            continue;
                        }
                    };
                    for value in &messages {
                        let Some(status) = StatusMessage::from_value(value) else {
                            continue;
                        };
                        tracing::debug!(feed = self.feed(), status = %status.status, "Auth status");
                        if self.auth.on_status(&status)? {
                            return Ok(());
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(_))) | None => return Err(FeedError::ConnectionClosed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn send_control<W>(&self, write: &mut W, request: &ControlRequest) -> Result<(), FeedError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let text = self.codec.encode(request)?;
        tracing::debug!(feed = self.feed(), action = ?request.action, ?request, "Sending control frame");
        write.send(Message::Text(text.into())).await?;
        Ok(())
    }

    fn topics(&self, symbol: &str) -> Topics {
        Topics::new(self.config.symbol_class, symbol, self.config.include_quotes)
    }

    /// Subscribe to `symbol` on a fresh connection.
    async fn subscribe<W>(&mut self, write: &mut W, symbol: String) -> Result<(), FeedError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let request = ControlRequest::subscribe(&self.topics(&symbol));
        self.send_control(write, &request).await?;
        self.mark_subscribed(symbol);
        Ok(())
    }

    /// Swap the live subscription to `next`.
    async fn resubscribe<W>(&mut self, write: &mut W, next: String) -> Result<(), FeedError>
    where
        W: Sink<Message, Error = tungstenite::Error> + Unpin,
    {
        let Some(previous) = self.subscribed.clone() else {
            return self.subscribe(write, next).await;
        };
        if previous == next {
            return Ok(());
        }

        self.state.set_state(FeedConnectionState::Resubscribing);
        tracing::info!(feed = self.feed(), from = %previous, to = %next, "Resubscribing");

        let unsubscribe = ControlRequest::unsubscribe(&self.topics(&previous));
        self.send_control(write, &unsubscribe).await?;
        let subscribe = ControlRequest::subscribe(&self.topics(&next));
        self.send_control(write, &subscribe).await?;

        self.mark_subscribed(next);
        self.state.set_state(FeedConnectionState::Receiving);
        Ok(())
    }

    fn mark_subscribed(&mut self, symbol: String) {
        self.state.set_state(FeedConnectionState::Subscribed);
        tracing::debug!(feed = self.feed(), symbol = %symbol, "Subscribed");

        let changed = self
            .subscribed
            .as_ref()
            .is_some_and(|previous| *previous != symbol);
        if changed && self.config.reset_on_symbol_change {
            for channel in self.trade_channels.iter().chain(&self.quote_channels) {
                self.registry.reset_series(channel);
            }
            self.registry.reset_exchanges(self.config.symbol_class);
            tracing::debug!(feed = self.feed(), "Channels reset for new symbol");
        }
        self.subscribed = Some(symbol);
    }

    /// Decode a text frame and route its events.
    fn handle_frame(&self, text: &str) {
        self.state.increment_messages();
        metrics::record_frame_received(self.config.symbol_class);

        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(feed = self.feed(), error = %e, "Undecodable frame skipped");
                return;
            }
        };

        for value in &messages {
            self.handle_message(value);
        }
    }

    fn handle_message(&self, value: &Value) {
        if let Some(status) = StatusMessage::from_value(value) {
            match status.kind() {
                StatusKind::Error | StatusKind::MaxConnections => {
                    tracing::warn!(feed = self.feed(), status = %status.status, message = %status.message, "Server error status");
                }
                _ => {
                    tracing::debug!(feed = self.feed(), status = %status.status, message = %status.message, "Status");
                }
            }
            return;
        }

        let Some(record) = self.classifier.classify(value) else {
            metrics::record_unrecognized_event(self.config.symbol_class);
            tracing::trace!(feed = self.feed(), "Unrecognized message skipped");
            return;
        };
        metrics::record_event_classified(self.config.symbol_class, record.kind());

        if self.subscribed.as_deref() != Some(record.symbol()) {
            tracing::trace!(feed = self.feed(), symbol = record.symbol(), "Event for inactive symbol dropped");
            return;
        }

        let channels = match record.kind() {
            EventKind::Trade => {
                self.registry.record_exchange(&record);
                &self.trade_channels
            }
            EventKind::Quote => &self.quote_channels,
        };
        for channel in channels {
            if self.registry.route(channel, &record) == RouteOutcome::Scheduled {
                metrics::record_routed(channel);
            }
        }
    }
}
