//! Series Delivery Integration Tests
//!
//! Routes records through the public registry API and checks what
//! attached consumers observe.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;

use tickscope_stream::{
    ChannelRegistry, EventRecord, ExchangeCount, ExchangeDirectory, RouteOutcome, SeriesValue,
    SymbolClass, channel_context,
};

const T0: i64 = 1_700_000_000_000;

fn trade(price: f64, size: u64, offset_ms: i64) -> EventRecord {
    EventRecord::trade(SymbolClass::Equity, "TSLA", price, size, Some(T0 + offset_ms))
}

fn prices(registry: &ChannelRegistry, channel: &str) -> Vec<f64> {
    registry
        .snapshot(channel)
        .unwrap()
        .into_iter()
        .map(|point| match point.value {
            SeriesValue::Price { price, .. } => price,
            other => panic!("unexpected value {other:?}"),
        })
        .collect()
}

#[test]
fn backlog_flushed_in_order_on_attach() {
    let registry = ChannelRegistry::standard(2_500).unwrap();

    for (i, price) in [10.0, 11.0, 12.0].into_iter().enumerate() {
        let outcome = registry.route("stock_price", &trade(price, 100, i64::try_from(i).unwrap()));
        assert_eq!(outcome, RouteOutcome::Scheduled);
    }
    assert_eq!(registry.pending_len("stock_price"), Some(3));
    assert!(registry.snapshot("stock_price").unwrap().is_empty());

    let (context, mut runner) = channel_context();
    let session = registry.attach("stock_price", Arc::new(context)).unwrap();
    assert_eq!(registry.session("stock_price"), Some(session));
    assert_eq!(registry.pending_len("stock_price"), Some(0));

    let changes = runner.drain_ready();
    assert_eq!(changes.len(), 3);
    assert_eq!(prices(&registry, "stock_price"), vec![10.0, 11.0, 12.0]);
    assert_eq!(registry.padded_range("stock_price"), Some((9.8, 12.2)));
}

#[test]
fn detached_channel_queues_until_next_consumer() {
    let registry = ChannelRegistry::standard(100).unwrap();
    let (first, mut first_runner) = channel_context();
    registry.attach("stock_volume", Arc::new(first));

    registry.route("stock_volume", &trade(1.0, 5, 0));
    assert_eq!(first_runner.drain_ready().len(), 1);

    assert!(registry.detach("stock_volume"));
    registry.route("stock_volume", &trade(1.0, 7, 1));
    registry.route("stock_volume", &trade(1.0, 9, 2));
    assert_eq!(registry.pending_len("stock_volume"), Some(2));
    assert!(first_runner.drain_ready().is_empty());

    let (second, mut second_runner) = channel_context();
    registry.attach("stock_volume", Arc::new(second));
    let lens: Vec<_> = second_runner.drain_ready().iter().map(|c| c.len).collect();
    assert_eq!(lens, vec![2, 3]);
}

#[test]
fn capacity_evicts_oldest() {
    let registry = ChannelRegistry::builder()
        .channel_with_capacity("stock_price", tickscope_stream::SeriesKind::Price, 3)
        .build()
        .unwrap();
    let (context, mut runner) = channel_context();
    registry.attach("stock_price", Arc::new(context));

    for i in 0..5_i32 {
        registry.route("stock_price", &trade(f64::from(i), 1, i64::from(i)));
    }
    runner.drain_ready();

    assert_eq!(prices(&registry, "stock_price"), vec![2.0, 3.0, 4.0]);
}

#[test]
fn reset_clears_after_earlier_appends() {
    let registry = ChannelRegistry::standard(100).unwrap();
    let (context, mut runner) = channel_context();
    registry.attach("stock_price", Arc::new(context));

    registry.route("stock_price", &trade(5.0, 1, 0));
    assert!(registry.reset_series("stock_price"));
    registry.route("stock_price", &trade(6.0, 1, 1));

    let changes = runner.drain_ready();
    assert_eq!(changes.len(), 3);
    assert!(changes[1].was_reset);
    assert_eq!(prices(&registry, "stock_price"), vec![6.0]);
}

#[test]
fn quotes_feed_spread_channel_only() {
    let registry = ChannelRegistry::standard(100).unwrap();
    let quote = EventRecord::quote(SymbolClass::Option, "TSLA240315C00220000", Some(4.1), None, Some(T0));

    assert_eq!(registry.route("option_bidask", &quote), RouteOutcome::Scheduled);
    assert_eq!(registry.route("option_price", &quote), RouteOutcome::NotApplicable);

    let (context, mut runner) = channel_context();
    registry.attach("option_bidask", Arc::new(context));
    let change = runner.drain_ready().pop().unwrap();
    assert_eq!(
        change.latest.unwrap().value,
        SeriesValue::Spread { bid: Some(4.1), ask: None }
    );
}

#[test]
fn unknown_channel_is_harmless() {
    let registry = ChannelRegistry::standard(100).unwrap();
    let (context, _runner) = channel_context();

    assert_eq!(registry.route("crypto_price", &trade(1.0, 1, 0)), RouteOutcome::UnknownChannel);
    assert!(registry.attach("crypto_price", Arc::new(context)).is_none());
    assert!(!registry.detach("crypto_price"));
    assert!(!registry.reset_series("crypto_price"));
    assert!(registry.snapshot("crypto_price").is_none());
    assert_eq!(registry.stats().queued, 0);
}

#[test]
fn trades_tallied_under_directory_names() {
    let directory = ExchangeDirectory::from_json(
        r#"{"results":[{"id":4,"name":"NYSE American, LLC"},{"id":12,"name":"Nasdaq"}]}"#,
    )
    .unwrap();
    let registry = ChannelRegistry::builder()
        .feed_channels(SymbolClass::Equity)
        .feed_channels(SymbolClass::Option)
        .exchange_names(Arc::new(directory))
        .build()
        .unwrap();

    for (size, exchange) in [(100, 12), (50, 4), (10, 12), (1, 99)] {
        registry.record_exchange(&trade(1.0, size, 0).with_exchange(exchange));
    }

    assert_eq!(
        registry.exchange_counts(SymbolClass::Equity),
        vec![
            ExchangeCount { name: "Nasdaq".into(), trades: 2, volume: 110 },
            ExchangeCount { name: "ID 99".into(), trades: 1, volume: 1 },
            ExchangeCount { name: "NYSE American, LLC".into(), trades: 1, volume: 50 },
        ]
    );
    assert!(registry.exchange_counts(SymbolClass::Option).is_empty());
}
