//! Application Services
//!
//! - `ChannelRegistry`: named channels, each owning a rolling series
//! - `UpdateScheduler`: hands series mutations to attached consumers and
//!   queues them while none is attached
//! - `ExchangeTally`: trade counts per reporting exchange

/// Named channel registry and record routing.
pub mod registry;

/// Consumer hand-off and pending update queues.
pub mod scheduler;

/// Per-exchange trade counts.
pub mod tally;
