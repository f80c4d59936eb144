//! Event Records
//!
//! Canonical in-process representation of a classified market event.
//! A record is built once by the classifier, routed to the channels
//! that care about it, and then dropped.

use chrono::{DateTime, Utc};

// =============================================================================
// Classification Tags
// =============================================================================

/// Kind of market event carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A trade print.
    Trade,
    /// A top-of-book quote update.
    Quote,
}

impl EventKind {
    /// Wire prefix used in subscription params (`T` / `Q`).
    #[must_use]
    pub const fn wire_prefix(self) -> &'static str {
        match self {
            Self::Trade => "T",
            Self::Quote => "Q",
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Quote => "quote",
        }
    }
}

/// Asset class of the symbol an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    /// Listed equity (underlying).
    Equity,
    /// Listed option contract.
    Option,
}

impl SymbolClass {
    /// Prefix of the channel names owned by feeds of this class.
    #[must_use]
    pub const fn channel_prefix(self) -> &'static str {
        match self {
            Self::Equity => "stock",
            Self::Option => "option",
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Option => "option",
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Kind-specific fields of an event.
///
/// The variant always agrees with [`EventRecord::kind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Trade print fields.
    Trade {
        /// Execution price, `0.0` when missing or malformed.
        price: f64,
        /// Executed size, `0` when missing or malformed.
        size: u64,
        /// Reporting exchange id, when present.
        exchange: Option<u32>,
    },
    /// Quote fields. A side is `None` when the wire message carried no usable value.
    Quote {
        /// Best bid price.
        bid: Option<f64>,
        /// Best ask price.
        ask: Option<f64>,
    },
}

// =============================================================================
// EventRecord
// =============================================================================

/// A classified trade or quote.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    symbol_class: SymbolClass,
    symbol: String,
    payload: EventPayload,
    event_time_millis: Option<i64>,
}

impl EventRecord {
    /// Build a trade record.
    #[must_use]
    pub fn trade(
        symbol_class: SymbolClass,
        symbol: impl Into<String>,
        price: f64,
        size: u64,
        event_time_millis: Option<i64>,
    ) -> Self {
        Self {
            symbol_class,
            symbol: symbol.into(),
            payload: EventPayload::Trade {
                price,
                size,
                exchange: None,
            },
            event_time_millis,
        }
    }

    /// Build a quote record.
    #[must_use]
    pub fn quote(
        symbol_class: SymbolClass,
        symbol: impl Into<String>,
        bid: Option<f64>,
        ask: Option<f64>,
        event_time_millis: Option<i64>,
    ) -> Self {
        Self {
            symbol_class,
            symbol: symbol.into(),
            payload: EventPayload::Quote { bid, ask },
            event_time_millis,
        }
    }

    /// Attach the reporting exchange to a trade. No effect on quotes.
    #[must_use]
    pub fn with_exchange(mut self, exchange_id: u32) -> Self {
        if let EventPayload::Trade { exchange, .. } = &mut self.payload {
            *exchange = Some(exchange_id);
        }
        self
    }

    /// Event kind, derived from the payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Trade { .. } => EventKind::Trade,
            EventPayload::Quote { .. } => EventKind::Quote,
        }
    }

    /// Asset class of the symbol.
    #[must_use]
    pub const fn symbol_class(&self) -> SymbolClass {
        self.symbol_class
    }

    /// Ticker or option contract code, without any wire prefix.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Kind-specific fields.
    #[must_use]
    pub const fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Exchange-reported event time in epoch milliseconds.
    #[must_use]
    pub const fn event_time_millis(&self) -> Option<i64> {
        self.event_time_millis
    }

    /// True when the wire message carried no usable timestamp.
    #[must_use]
    pub const fn uses_ingestion_time(&self) -> bool {
        self.event_time_millis.is_none()
    }

    /// Event time, or `ingested_at` when the record has none.
    #[must_use]
    pub fn timestamp_or(&self, ingested_at: DateTime<Utc>) -> DateTime<Utc> {
        self.event_time_millis
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(ingested_at)
    }

    /// Trade price, if this is a trade.
    #[must_use]
    pub const fn price(&self) -> Option<f64> {
        match self.payload {
            EventPayload::Trade { price, .. } => Some(price),
            EventPayload::Quote { .. } => None,
        }
    }

    /// Trade size, if this is a trade.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        match self.payload {
            EventPayload::Trade { size, .. } => Some(size),
            EventPayload::Quote { .. } => None,
        }
    }

    /// Bid price with the `0.0` default applied. `None` for trades.
    #[must_use]
    pub fn bid(&self) -> Option<f64> {
        match self.payload {
            EventPayload::Quote { bid, .. } => Some(bid.unwrap_or(0.0)),
            EventPayload::Trade { .. } => None,
        }
    }

    /// Ask price with the `0.0` default applied. `None` for trades.
    #[must_use]
    pub fn ask(&self) -> Option<f64> {
        match self.payload {
            EventPayload::Quote { ask, .. } => Some(ask.unwrap_or(0.0)),
            EventPayload::Trade { .. } => None,
        }
    }
}
