#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Tickscope Stream - Market Data Ingestion Core
//!
//! Maintains live WebSocket connections to Polygon's stocks and options
//! clusters, classifies trades and quotes, and keeps bounded rolling series
//! (price, bid/ask spread, volume) that real-time displays read from.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market events and series logic, no I/O
//!   - `event`, `classifier`: wire message to [`EventRecord`]
//!   - `alpha`: trade size to marker opacity
//!   - `series`: bounded [`RollingSeries`] with padded ranges
//!   - `ticker`: OCC option symbol parsing
//!
//! - **Application**: Delivery of series updates
//!   - `ports`: [`ConsumerContext`] implemented by the rendering side
//!   - `services`: [`ChannelRegistry`], [`UpdateScheduler`] and [`ExchangeTally`]
//!
//! - **Infrastructure**: Adapters and ambient plumbing
//!   - `polygon`: [`FeedClient`] per cluster, controlled via [`FeedHandle`]
//!   - `context`: channel-backed [`ConsumerContext`]
//!   - `exchanges`, `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! Polygon stocks WS ──┐
//!                     │   ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//!                     ├──►│ classifier │──►│   registry   │──►│  scheduler   │──► consumer
//! Polygon options WS ─┘   └────────────┘   │ route/derive │   │ submit/queue │    context
//!                                          └──────────────┘   └──────────────┘       │
//!                                                                   series ◄─ apply ─┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market events and series logic with no I/O.
pub mod domain;

/// Application layer - Channel registry and update scheduling.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::event::{EventKind, EventPayload, EventRecord, SymbolClass};
pub use domain::series::{Point, RollingSeries, SeriesError, SeriesKind, SeriesValue};
pub use domain::ticker::{OptionContract, OptionRight, Ticker, TickerError, parse_ticker};

// Application services
pub use application::ports::{ConsumerContext, DeliveryError, ExchangeNames, NumericExchangeNames};
pub use application::services::registry::{ChannelRegistry, RegistryError, RouteOutcome};
pub use application::services::scheduler::{
    Mutation, SchedulerStats, SeriesChange, SessionId, UpdateJob, UpdateScheduler,
};
pub use application::services::tally::{ExchangeCount, ExchangeTally};

// Feeds
pub use infrastructure::polygon::{
    ApiKey, FeedClient, FeedConfig, FeedConnectionState, FeedError, FeedHandle, FeedState,
};

// Consumer context
pub use infrastructure::context::{ChannelContext, ContextRunner, channel_context};

// Reference data
pub use infrastructure::exchanges::{ExchangeDirectory, ExchangeDirectoryError};

// Configuration
pub use infrastructure::config::{ConfigError, ConnectionSettings, FeedSettings, TickscopeConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
