//! Domain Layer - Core market event types and series logic.
//!
//! Everything here is synchronous and free of I/O: classification of wire
//! messages, trade-size opacity, bounded rolling series and ticker parsing.

/// Classified trade and quote records.
pub mod event;

/// Wire message to record classification.
pub mod classifier;

/// Trade size to marker opacity encoding.
pub mod alpha;

/// Bounded rolling time series.
pub mod series;

/// Equity and OCC option ticker parsing.
pub mod ticker;
