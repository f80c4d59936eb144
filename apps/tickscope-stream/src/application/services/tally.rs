//! Exchange Tally
//!
//! Counts trades and traded volume per reporting exchange, separately for
//! each symbol class. Exchange ids are resolved to display names through
//! the [`ExchangeNames`] port when recorded, so a snapshot is ready to plot
//! as a histogram.
//!
//! Trades without an exchange id and quotes are not counted.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::{ExchangeNames, NumericExchangeNames};
use crate::domain::event::{EventPayload, EventRecord, SymbolClass};

/// Activity seen on one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCount {
    /// Exchange display name.
    pub name: String,
    /// Number of trades.
    pub trades: u64,
    /// Sum of trade sizes.
    pub volume: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    trades: u64,
    volume: u64,
}

/// Per-class trade counts keyed by exchange name.
#[derive(Debug)]
pub struct ExchangeTally {
    names: Arc<dyn ExchangeNames>,
    counts: Mutex<HashMap<SymbolClass, HashMap<String, Counters>>>,
}

impl Default for ExchangeTally {
    fn default() -> Self {
        Self::new(Arc::new(NumericExchangeNames))
    }
}

impl ExchangeTally {
    /// Create an empty tally resolving names through `names`.
    #[must_use]
    pub fn new(names: Arc<dyn ExchangeNames>) -> Self {
        Self {
            names,
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Count a trade. Returns the exchange name it was counted under.
    pub fn record(&self, record: &EventRecord) -> Option<String> {
        let EventPayload::Trade {
            size,
            exchange: Some(id),
            ..
        } = *record.payload()
        else {
            return None;
        };

        let name = self.names.name(id);
        let mut counts = self.counts.lock();
        let counters = counts
            .entry(record.symbol_class())
            .or_default()
            .entry(name.clone())
            .or_default();
        counters.trades += 1;
        counters.volume = counters.volume.saturating_add(size);
        Some(name)
    }

    /// Counts for a class, busiest exchange first, ties by name.
    #[must_use]
    pub fn snapshot(&self, class: SymbolClass) -> Vec<ExchangeCount> {
        let counts = self.counts.lock();
        let mut rows: Vec<ExchangeCount> = counts
            .get(&class)
            .into_iter()
            .flatten()
            .map(|(name, counters)| ExchangeCount {
                name: name.clone(),
                trades: counters.trades,
                volume: counters.volume,
            })
            .collect();
        drop(counts);

        rows.sort_by(|a, b| {
            Reverse(a.trades)
                .cmp(&Reverse(b.trades))
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }

    /// Forget everything counted for a class.
    pub fn reset(&self, class: SymbolClass) {
        self.counts.lock().remove(&class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Names;

    impl ExchangeNames for Names {
        fn name(&self, id: u32) -> String {
            match id {
                4 => "NYSE American".to_string(),
                10 => "Nasdaq".to_string(),
                other => format!("ID {other}"),
            }
        }
    }

    fn trade(class: SymbolClass, size: u64, exchange: u32) -> EventRecord {
        EventRecord::trade(class, "TSLA", 1.0, size, None).with_exchange(exchange)
    }

    #[test]
    fn counts_by_name_busiest_first() {
        let tally = ExchangeTally::new(Arc::new(Names));
        tally.record(&trade(SymbolClass::Equity, 100, 4));
        tally.record(&trade(SymbolClass::Equity, 50, 10));
        assert_eq!(
            tally.record(&trade(SymbolClass::Equity, 25, 10)).as_deref(),
            Some("Nasdaq")
        );

        assert_eq!(
            tally.snapshot(SymbolClass::Equity),
            vec![
                ExchangeCount { name: "Nasdaq".into(), trades: 2, volume: 75 },
                ExchangeCount { name: "NYSE American".into(), trades: 1, volume: 100 },
            ]
        );
    }

    #[test]
    fn classes_kept_apart() {
        let tally = ExchangeTally::new(Arc::new(Names));
        tally.record(&trade(SymbolClass::Option, 3, 4));

        assert!(tally.snapshot(SymbolClass::Equity).is_empty());
        assert_eq!(tally.snapshot(SymbolClass::Option).len(), 1);

        tally.reset(SymbolClass::Option);
        assert!(tally.snapshot(SymbolClass::Option).is_empty());
    }

    #[test]
    fn quotes_and_unattributed_trades_ignored() {
        let tally = ExchangeTally::default();
        let quote = EventRecord::quote(SymbolClass::Equity, "TSLA", Some(1.0), None, None);
        let bare = EventRecord::trade(SymbolClass::Equity, "TSLA", 1.0, 5, None);

        assert_eq!(tally.record(&quote), None);
        assert_eq!(tally.record(&bare), None);
        assert!(tally.snapshot(SymbolClass::Equity).is_empty());
    }

    #[test]
    fn numeric_names_by_default() {
        let tally = ExchangeTally::default();
        assert_eq!(
            tally.record(&trade(SymbolClass::Equity, 1, 62)).as_deref(),
            Some("ID 62")
        );
    }
}
