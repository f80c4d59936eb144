//! Message Classification
//!
//! Turns one decoded wire message into an [`EventRecord`].
//!
//! # Wire Fields
//!
//! | Field | Meaning | Event |
//! |-------|---------|-------|
//! | `ev`  | event type (`T` trade, `Q` quote) | all |
//! | `sym` | symbol, options prefixed with `O:` | all |
//! | `p`   | trade price | trade |
//! | `s`   | trade size | trade |
//! | `x`   | exchange id | trade |
//! | `bp` / `ap` | bid / ask price | quote |
//! | `t`   | event time, epoch milliseconds | all |
//!
//! Malformed numeric fields never reject a message: they fall back to the
//! field default. A zero `t` counts as absent. Messages with any other `ev` (status frames included)
//! are not market events and classify to `None`.

use serde_json::{Map, Value};

use super::event::{EventRecord, SymbolClass};

/// Wire prefix Polygon puts in front of option contract symbols.
pub const OPTION_SYMBOL_PREFIX: &str = "O:";

/// Classifies wire messages for one feed.
#[derive(Debug, Clone, Copy)]
pub struct MessageClassifier {
    symbol_class: SymbolClass,
}

impl MessageClassifier {
    /// Create a classifier for a feed carrying `symbol_class` events.
    #[must_use]
    pub const fn new(symbol_class: SymbolClass) -> Self {
        Self { symbol_class }
    }

    /// Asset class stamped on every record.
    #[must_use]
    pub const fn symbol_class(&self) -> SymbolClass {
        self.symbol_class
    }

    /// Classify a single message.
    ///
    /// Returns `None` for non-objects, status frames and unknown event types.
    #[must_use]
    pub fn classify(&self, message: &Value) -> Option<EventRecord> {
        let fields = message.as_object()?;
        let event_type = fields.get("ev").and_then(Value::as_str)?;

        match event_type {
            "T" => Some(self.trade(fields)),
            "Q" => Some(self.quote(fields)),
            _ => None,
        }
    }

    fn trade(&self, fields: &Map<String, Value>) -> EventRecord {
        let price = fields.get("p").and_then(coerce_price).unwrap_or(0.0);
        let size = fields.get("s").and_then(coerce_count).unwrap_or(0);
        let record = EventRecord::trade(
            self.symbol_class,
            symbol_of(fields),
            price,
            size,
            fields.get("t").and_then(coerce_millis),
        );

        match fields
            .get("x")
            .and_then(coerce_count)
            .and_then(|id| u32::try_from(id).ok())
        {
            Some(exchange) => record.with_exchange(exchange),
            None => record,
        }
    }

    fn quote(&self, fields: &Map<String, Value>) -> EventRecord {
        EventRecord::quote(
            self.symbol_class,
            symbol_of(fields),
            fields.get("bp").and_then(coerce_price),
            fields.get("ap").and_then(coerce_price),
            fields.get("t").and_then(coerce_millis),
        )
    }
}

fn symbol_of(fields: &Map<String, Value>) -> String {
    let raw = fields.get("sym").and_then(Value::as_str).unwrap_or_default();
    raw.strip_prefix(OPTION_SYMBOL_PREFIX)
        .unwrap_or(raw)
        .to_string()
}

/// Non-negative finite float from a number or numeric string.
fn coerce_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

/// Non-negative integer; integral floats are accepted.
fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_u64))
        }
        _ => None,
    }
}

/// Positive epoch milliseconds; zero means the event carried no time.
fn coerce_millis(value: &Value) -> Option<i64> {
    coerce_count(value)
        .filter(|ms| *ms > 0)
        .and_then(|ms| i64::try_from(ms).ok())
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn integral_u64(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::domain::event::{EventKind, EventPayload};

    fn equity() -> MessageClassifier {
        MessageClassifier::new(SymbolClass::Equity)
    }

    #[test]
    fn classifies_trade() {
        let msg = json!({"ev": "T", "sym": "TSLA", "p": 251.25, "s": 300, "t": 1_700_000_000_000_i64, "x": 4});
        let record = equity().classify(&msg).unwrap();

        assert_eq!(record.kind(), EventKind::Trade);
        assert_eq!(record.symbol(), "TSLA");
        assert_eq!(
            record.payload(),
            &EventPayload::Trade {
                price: 251.25,
                size: 300,
                exchange: Some(4)
            }
        );
        assert_eq!(record.event_time_millis(), Some(1_700_000_000_000));
    }

    #[test]
    fn classifies_quote() {
        let msg = json!({"ev": "Q", "sym": "TSLA", "bp": 250.1, "ap": 250.3, "t": 5});
        let record = equity().classify(&msg).unwrap();

        assert_eq!(record.kind(), EventKind::Quote);
        assert_eq!(record.bid(), Some(250.1));
        assert_eq!(record.ask(), Some(250.3));
    }

    #[test]
    fn option_symbol_prefix_stripped() {
        let classifier = MessageClassifier::new(SymbolClass::Option);
        let msg = json!({"ev": "T", "sym": "O:TSLA240315C00220000", "p": 3.1, "s": 2});
        let record = classifier.classify(&msg).unwrap();

        assert_eq!(record.symbol(), "TSLA240315C00220000");
        assert_eq!(record.symbol_class(), SymbolClass::Option);
    }

    #[test]
    fn missing_size_defaults_to_zero() {
        let record = equity()
            .classify(&json!({"ev": "T", "sym": "TSLA", "p": 1.0}))
            .unwrap();
        assert_eq!(record.size(), Some(0));
    }

    #[test]
    fn missing_time_flags_ingestion_time() {
        let record = equity()
            .classify(&json!({"ev": "T", "sym": "TSLA", "p": 1.0, "s": 1}))
            .unwrap();
        assert!(record.uses_ingestion_time());
    }

    #[test_case(json!({"ev": "T", "sym": "TSLA", "p": 1.0, "s": 1, "t": 0}); "zero trade time")]
    #[test_case(json!({"ev": "Q", "sym": "TSLA", "bp": 1.0, "ap": 1.1, "t": 0}); "zero quote time")]
    #[test_case(json!({"ev": "T", "sym": "TSLA", "p": 1.0, "s": 1, "t": "0"}); "zero string time")]
    fn zero_time_uses_ingestion_time(msg: Value) {
        let record = equity().classify(&msg).unwrap();
        assert!(record.uses_ingestion_time());
        assert_eq!(record.event_time_millis(), None);
    }

    #[test]
    fn quote_missing_sides_are_none() {
        let record = equity()
            .classify(&json!({"ev": "Q", "sym": "TSLA", "ap": 2.0}))
            .unwrap();
        assert_eq!(
            record.payload(),
            &EventPayload::Quote {
                bid: None,
                ask: Some(2.0)
            }
        );
        assert_eq!(record.bid(), Some(0.0));
    }

    #[test_case(json!("12.5"), Some(12.5); "numeric string")]
    #[test_case(json!(7), Some(7.0); "integer")]
    #[test_case(json!("abc"), None; "garbage string")]
    #[test_case(json!(-1.0), None; "negative")]
    #[test_case(json!(null), None; "null")]
    #[test_case(json!([1]), None; "array")]
    fn price_coercion(value: Value, expected: Option<f64>) {
        assert_eq!(coerce_price(&value), expected);
    }

    #[test_case(json!(100), Some(100); "integer")]
    #[test_case(json!(100.0), Some(100); "integral float")]
    #[test_case(json!(100.5), None; "fractional float")]
    #[test_case(json!("42"), Some(42); "numeric string")]
    #[test_case(json!(-3), None; "negative")]
    #[test_case(json!(true), None; "bool")]
    fn count_coercion(value: Value, expected: Option<u64>) {
        assert_eq!(coerce_count(&value), expected);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let msg = json!({"ev": "T", "sym": "TSLA", "p": "n/a", "s": "lots", "t": "later", "x": "NYSE"});
        let record = equity().classify(&msg).unwrap();

        assert_eq!(
            record.payload(),
            &EventPayload::Trade {
                price: 0.0,
                size: 0,
                exchange: None
            }
        );
        assert!(record.uses_ingestion_time());
    }

    #[test_case(json!({"ev": "status", "status": "connected", "message": "Connected Successfully"}); "status frame")]
    #[test_case(json!({"ev": "A", "sym": "TSLA"}); "aggregate")]
    #[test_case(json!({"sym": "TSLA", "p": 1.0}); "no event type")]
    #[test_case(json!([{"ev": "T"}]); "not an object")]
    #[test_case(json!({"ev": 5}); "non string event type")]
    fn non_market_messages_skipped(msg: Value) {
        assert!(equity().classify(&msg).is_none());
    }
}
