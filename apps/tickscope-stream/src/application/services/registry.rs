//! Channel Registry
//!
//! Maps channel names (`stock_price`, `option_bidask`, ...) to the rolling
//! series behind them and routes classified records into those series.
//!
//! # Design
//!
//! The set of channels is fixed when the registry is built, so lookups need
//! no lock. Each entry carries its own series lock and delivery lock; the
//! registry itself is shared as `Arc<ChannelRegistry>` between feed tasks
//! and consumers.
//!
//! Routing never touches a series directly. It derives the value for the
//! channel's [`SeriesKind`] and hands an append to the [`UpdateScheduler`],
//! which delivers it to whichever consumer is attached.
//!
//! Trades are also counted per reporting exchange in an [`ExchangeTally`],
//! once per record rather than once per channel.
//!
//! # Example
//!
//! ```rust
//! use tickscope_stream::application::services::registry::{ChannelRegistry, RouteOutcome};
//! use tickscope_stream::domain::event::{EventRecord, SymbolClass};
//!
//! let registry = ChannelRegistry::standard(2_500).unwrap();
//! let trade = EventRecord::trade(SymbolClass::Equity, "TSLA", 250.0, 100, None);
//!
//! assert_eq!(registry.route("stock_price", &trade), RouteOutcome::Scheduled);
//! assert_eq!(registry.route("no_such_chart", &trade), RouteOutcome::UnknownChannel);
//! assert_eq!(registry.pending_len("stock_price"), Some(1));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use super::scheduler::{
    DeliveryQueue, Mutation, SchedulerStats, SessionId, SharedSeries, UpdateScheduler,
};
use super::tally::{ExchangeCount, ExchangeTally};
use crate::application::ports::{ConsumerContext, ExchangeNames};
use crate::domain::alpha;
use crate::domain::event::{EventKind, EventPayload, EventRecord, SymbolClass};
use crate::domain::series::{Point, RollingSeries, SeriesError, SeriesKind, SeriesValue};

// =============================================================================
// Channel Naming
// =============================================================================

/// Series kinds fed by each event kind.
#[must_use]
pub const fn series_kinds_for(kind: EventKind) -> &'static [SeriesKind] {
    match kind {
        EventKind::Trade => &[SeriesKind::Price, SeriesKind::Volume],
        EventKind::Quote => &[SeriesKind::Spread],
    }
}

/// Channel name for a symbol class and series kind, e.g. `option_bidask`.
#[must_use]
pub fn channel_name(class: SymbolClass, kind: SeriesKind) -> String {
    format!("{}_{}", class.channel_prefix(), kind.channel_suffix())
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two channels share a name.
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),

    /// A series could not be created.
    #[error("invalid series for channel {channel}: {source}")]
    Series {
        /// Channel being built.
        channel: String,
        /// Underlying series error.
        source: SeriesError,
    },
}

// =============================================================================
// Entries
// =============================================================================

/// One named channel: its series plus delivery state.
#[derive(Debug)]
pub struct ChannelEntry {
    name: Arc<str>,
    kind: SeriesKind,
    series: SharedSeries,
    delivery: Mutex<DeliveryQueue>,
}

impl ChannelEntry {
    /// Create an entry with an empty series.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(name: &str, kind: SeriesKind, capacity: usize) -> Result<Self, SeriesError> {
        Ok(Self {
            name: Arc::from(name),
            kind,
            series: Arc::new(Mutex::new(RollingSeries::new(kind, capacity)?)),
            delivery: Mutex::new(DeliveryQueue::default()),
        })
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value shape of the channel's series.
    #[must_use]
    pub const fn kind(&self) -> SeriesKind {
        self.kind
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub(crate) fn shared_series(&self) -> SharedSeries {
        Arc::clone(&self.series)
    }

    pub(crate) const fn delivery(&self) -> &Mutex<DeliveryQueue> {
        &self.delivery
    }
}

/// What happened to a routed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// An append was scheduled.
    Scheduled,
    /// No channel has that name.
    UnknownChannel,
    /// The record carries nothing this channel plots.
    NotApplicable,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`ChannelRegistry`] with a chosen subset of channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistryBuilder {
    channels: Vec<(String, SeriesKind, Option<usize>)>,
    capacity: Option<usize>,
    exchange_names: Option<Arc<dyn ExchangeNames>>,
}

impl ChannelRegistryBuilder {
    /// Default capacity for channels added without one.
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Exchange name lookup for the trade tally. Ids are shown as `"ID <n>"`
    /// without one.
    #[must_use]
    pub fn exchange_names(mut self, names: Arc<dyn ExchangeNames>) -> Self {
        self.exchange_names = Some(names);
        self
    }

    /// Add a channel using the default capacity.
    #[must_use]
    pub fn channel(mut self, name: impl Into<String>, kind: SeriesKind) -> Self {
        self.channels.push((name.into(), kind, None));
        self
    }

    /// Add a channel with its own capacity.
    #[must_use]
    pub fn channel_with_capacity(
        mut self,
        name: impl Into<String>,
        kind: SeriesKind,
        capacity: usize,
    ) -> Self {
        self.channels.push((name.into(), kind, Some(capacity)));
        self
    }

    /// Add the three channels fed by a symbol class.
    #[must_use]
    pub fn feed_channels(self, class: SymbolClass) -> Self {
        [SeriesKind::Price, SeriesKind::Spread, SeriesKind::Volume]
            .into_iter()
            .fold(self, |builder, kind| builder.channel(channel_name(class, kind), kind))
    }

    /// Build the registry.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names or a zero capacity.
    pub fn build(self) -> Result<ChannelRegistry, RegistryError> {
        let default_capacity = self
            .capacity
            .unwrap_or(crate::domain::series::DEFAULT_CAPACITY);
        let mut entries = HashMap::with_capacity(self.channels.len());

        for (name, kind, capacity) in self.channels {
            if entries.contains_key(&name) {
                return Err(RegistryError::DuplicateChannel(name));
            }

            let entry = ChannelEntry::new(&name, kind, capacity.unwrap_or(default_capacity))
                .map_err(|source| RegistryError::Series {
                    channel: name.clone(),
                    source,
                })?;
            entries.insert(name, entry);
        }

        Ok(ChannelRegistry {
            entries,
            scheduler: UpdateScheduler::new(),
            exchanges: self
                .exchange_names
                .map(ExchangeTally::new)
                .unwrap_or_default(),
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Named channels and the scheduler that feeds them.
#[derive(Debug)]
pub struct ChannelRegistry {
    entries: HashMap<String, ChannelEntry>,
    scheduler: UpdateScheduler,
    exchanges: ExchangeTally,
}

impl ChannelRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> ChannelRegistryBuilder {
        ChannelRegistryBuilder::default()
    }

    /// Registry with the six equity and option channels.
    ///
    /// # Errors
    ///
    /// Returns an error when `capacity` is zero.
    pub fn standard(capacity: usize) -> Result<Self, RegistryError> {
        Self::builder()
            .capacity(capacity)
            .feed_channels(SymbolClass::Equity)
            .feed_channels(SymbolClass::Option)
            .build()
    }

    /// Route a record into a channel.
    ///
    /// Unknown channels and records the channel does not plot are ignored.
    pub fn route(&self, channel: &str, record: &EventRecord) -> RouteOutcome {
        let Some(entry) = self.entries.get(channel) else {
            tracing::debug!(channel, "Route to unknown channel ignored");
            return RouteOutcome::UnknownChannel;
        };

        let Some(value) = derive_value(entry.kind(), record) else {
            tracing::trace!(
                channel,
                kind = record.kind().as_str(),
                "Record not applicable to channel"
            );
            return RouteOutcome::NotApplicable;
        };

        let timestamp = record.timestamp_or(Utc::now());
        self.scheduler
            .schedule(entry, Mutation::append(timestamp, value));
        RouteOutcome::Scheduled
    }

    /// Count a trade under its reporting exchange.
    ///
    /// Returns the exchange name, or `None` for quotes and trades without
    /// an exchange id.
    pub fn record_exchange(&self, record: &EventRecord) -> Option<String> {
        let name = self.exchanges.record(record)?;
        tracing::trace!(
            class = record.symbol_class().as_str(),
            exchange = %name,
            "Trade counted"
        );
        Some(name)
    }

    /// Trade counts per exchange for a symbol class, busiest first.
    #[must_use]
    pub fn exchange_counts(&self, class: SymbolClass) -> Vec<ExchangeCount> {
        self.exchanges.snapshot(class)
    }

    /// Clear the exchange counts of a symbol class.
    pub fn reset_exchanges(&self, class: SymbolClass) {
        self.exchanges.reset(class);
    }

    /// Attach a consumer to a channel. The last attach wins.
    ///
    /// Returns `None` for an unknown channel.
    pub fn attach(&self, channel: &str, context: Arc<dyn ConsumerContext>) -> Option<SessionId> {
        let Some(entry) = self.entries.get(channel) else {
            tracing::debug!(channel, "Attach to unknown channel ignored");
            return None;
        };
        Some(self.scheduler.attach(entry, context))
    }

    /// Detach a channel's consumer. Returns `true` if one was attached.
    pub fn detach(&self, channel: &str) -> bool {
        self.entries
            .get(channel)
            .and_then(|entry| self.scheduler.detach(entry))
            .is_some()
    }

    /// Schedule a reset of a channel's series, ordered after earlier appends.
    ///
    /// Returns `false` for an unknown channel.
    pub fn reset_series(&self, channel: &str) -> bool {
        let Some(entry) = self.entries.get(channel) else {
            tracing::debug!(channel, "Reset of unknown channel ignored");
            return false;
        };
        self.scheduler.schedule(entry, Mutation::Reset);
        true
    }

    /// Copy of a channel's points.
    #[must_use]
    pub fn snapshot(&self, channel: &str) -> Option<Vec<Point>> {
        self.entries
            .get(channel)
            .map(|entry| entry.series.lock().snapshot())
    }

    /// Padded value range of a channel's series.
    #[must_use]
    pub fn padded_range(&self, channel: &str) -> Option<(f64, f64)> {
        self.entries
            .get(channel)
            .map(|entry| entry.series.lock().padded_range())
    }

    /// Retry delivery of a channel's backlog.
    pub fn flush_pending(&self, channel: &str) -> usize {
        self.entries
            .get(channel)
            .map_or(0, |entry| self.scheduler.flush_pending(entry))
    }

    /// Number of jobs waiting for a consumer.
    #[must_use]
    pub fn pending_len(&self, channel: &str) -> Option<usize> {
        self.entries
            .get(channel)
            .map(|entry| entry.delivery().lock().pending_len())
    }

    /// Session of the attached consumer.
    #[must_use]
    pub fn session(&self, channel: &str) -> Option<SessionId> {
        self.entries
            .get(channel)
            .and_then(|entry| entry.delivery().lock().session())
    }

    /// True if the channel exists.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.entries.contains_key(channel)
    }

    /// Names of all channels, sorted.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Series kind of a channel.
    #[must_use]
    pub fn kind(&self, channel: &str) -> Option<SeriesKind> {
        self.entries.get(channel).map(ChannelEntry::kind)
    }

    /// Scheduler counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}

/// Value a record contributes to a series of `kind`.
#[allow(clippy::cast_precision_loss)]
fn derive_value(kind: SeriesKind, record: &EventRecord) -> Option<SeriesValue> {
    match (kind, record.payload()) {
        (SeriesKind::Price, &EventPayload::Trade { price, size, .. }) => Some(SeriesValue::Price {
            price,
            weight: alpha::encode(size),
        }),
        (SeriesKind::Volume, &EventPayload::Trade { size, .. }) => Some(SeriesValue::Volume {
            volume: size as f64,
        }),
        (SeriesKind::Spread, &EventPayload::Quote { bid, ask }) => {
            Some(SeriesValue::Spread { bid, ask })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{DeliveryError, MockConsumerContext};
    use crate::application::services::scheduler::UpdateJob;

    /// Context that applies each job as soon as it is submitted.
    fn applying_context() -> Arc<dyn ConsumerContext> {
        let mut mock = MockConsumerContext::new();
        mock.expect_submit().returning(|job: UpdateJob| {
            job.apply().unwrap();
            Ok(())
        });
        Arc::new(mock)
    }

    fn trade(price: f64, size: u64) -> EventRecord {
        EventRecord::trade(SymbolClass::Equity, "TSLA", price, size, Some(1_000))
    }

    #[test]
    fn standard_registry_has_six_channels() {
        let registry = ChannelRegistry::standard(10).unwrap();
        assert_eq!(
            registry.channel_names(),
            vec![
                "option_bidask",
                "option_price",
                "option_volume",
                "stock_bidask",
                "stock_price",
                "stock_volume",
            ]
        );
        assert_eq!(registry.kind("stock_bidask"), Some(SeriesKind::Spread));
    }

    #[test]
    fn duplicate_channel_rejected() {
        let err = ChannelRegistry::builder()
            .channel("a", SeriesKind::Price)
            .channel("a", SeriesKind::Volume)
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateChannel("a".into()));
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = ChannelRegistry::standard(0).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Series {
                source: SeriesError::ZeroCapacity,
                ..
            }
        ));
    }

    #[test]
    fn per_channel_capacity() {
        let registry = ChannelRegistry::builder()
            .channel_with_capacity("tiny", SeriesKind::Volume, 2)
            .build()
            .unwrap();
        registry.attach("tiny", applying_context());
        for size in 1..=5 {
            registry.route("tiny", &trade(1.0, size));
        }
        assert_eq!(registry.snapshot("tiny").unwrap().len(), 2);
    }

    #[test]
    fn unknown_channel_is_noop() {
        let registry = ChannelRegistry::standard(10).unwrap();

        assert_eq!(registry.route("nope", &trade(1.0, 1)), RouteOutcome::UnknownChannel);
        assert!(registry.attach("nope", applying_context()).is_none());
        assert!(!registry.detach("nope"));
        assert!(!registry.reset_series("nope"));
        assert!(registry.snapshot("nope").is_none());
        assert_eq!(registry.flush_pending("nope"), 0);
        assert_eq!(registry.stats(), SchedulerStats::default());
    }

    #[test]
    fn quote_not_applicable_to_price_channel() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let quote = EventRecord::quote(SymbolClass::Equity, "TSLA", Some(1.0), Some(1.1), None);

        assert_eq!(registry.route("stock_price", &quote), RouteOutcome::NotApplicable);
        assert_eq!(registry.route("stock_bidask", &quote), RouteOutcome::Scheduled);
        assert_eq!(registry.pending_len("stock_price"), Some(0));
    }

    #[test]
    fn price_channel_carries_alpha_weight() {
        let registry = ChannelRegistry::standard(10).unwrap();
        registry.attach("stock_price", applying_context());

        registry.route("stock_price", &trade(250.0, 10_000));

        let points = registry.snapshot("stock_price").unwrap();
        assert_eq!(points.len(), 1);
        let SeriesValue::Price { price, weight } = points[0].value else {
            panic!("expected price value");
        };
        assert!((price - 250.0).abs() < f64::EPSILON);
        assert!((weight - 1.0).abs() < 1e-12);
        assert_eq!(points[0].timestamp.timestamp_millis(), 1_000);
    }

    #[test]
    fn volume_channel_carries_size() {
        let registry = ChannelRegistry::standard(10).unwrap();
        registry.attach("stock_volume", applying_context());

        registry.route("stock_volume", &trade(250.0, 300));

        let points = registry.snapshot("stock_volume").unwrap();
        assert_eq!(points[0].value, SeriesValue::Volume { volume: 300.0 });
    }

    #[test]
    fn reset_is_ordered_with_appends() {
        let registry = ChannelRegistry::standard(10).unwrap();
        registry.route("stock_volume", &trade(1.0, 1));
        registry.reset_series("stock_volume");
        registry.route("stock_volume", &trade(1.0, 2));

        registry.attach("stock_volume", applying_context());

        let points = registry.snapshot("stock_volume").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, SeriesValue::Volume { volume: 2.0 });
        assert_eq!(registry.padded_range("stock_volume"), Some((1.0, 3.0)));
    }

    #[test]
    fn dead_consumer_backlog_goes_to_next_consumer() {
        let registry = ChannelRegistry::standard(10).unwrap();
        let mut dead = MockConsumerContext::new();
        dead.expect_submit()
            .returning(|job| Err(DeliveryError::Closed(job)));
        registry.attach("stock_volume", Arc::new(dead));

        registry.route("stock_volume", &trade(1.0, 7));
        assert!(registry.session("stock_volume").is_none());
        assert_eq!(registry.pending_len("stock_volume"), Some(1));

        registry.attach("stock_volume", applying_context());
        assert_eq!(registry.snapshot("stock_volume").unwrap().len(), 1);
    }

    #[derive(Debug)]
    struct Names;

    impl ExchangeNames for Names {
        fn name(&self, id: u32) -> String {
            if id == 10 { "Nasdaq".into() } else { format!("ID {id}") }
        }
    }

    #[test]
    fn exchange_tally_uses_configured_names() {
        let registry = ChannelRegistry::builder()
            .feed_channels(SymbolClass::Equity)
            .exchange_names(Arc::new(Names))
            .build()
            .unwrap();

        let nasdaq = trade(1.0, 40).with_exchange(10);
        assert_eq!(registry.record_exchange(&nasdaq).as_deref(), Some("Nasdaq"));
        assert_eq!(registry.record_exchange(&trade(1.0, 5).with_exchange(3)).as_deref(), Some("ID 3"));
        registry.record_exchange(&nasdaq);
        assert_eq!(registry.record_exchange(&trade(1.0, 5)), None);

        let counts = registry.exchange_counts(SymbolClass::Equity);
        assert_eq!(counts.len(), 2);
        assert_eq!((counts[0].name.as_str(), counts[0].trades, counts[0].volume), ("Nasdaq", 2, 80));

        registry.reset_exchanges(SymbolClass::Equity);
        assert!(registry.exchange_counts(SymbolClass::Equity).is_empty());
    }

    #[test]
    fn channel_names_for_feeds() {
        assert_eq!(channel_name(SymbolClass::Equity, SeriesKind::Spread), "stock_bidask");
        assert_eq!(channel_name(SymbolClass::Option, SeriesKind::Price), "option_price");
        assert_eq!(
            series_kinds_for(EventKind::Trade),
            &[SeriesKind::Price, SeriesKind::Volume]
        );
    }
}
