//! Rolling Series
//!
//! Fixed-capacity, append-only time series backing one chart.
//!
//! # Design
//!
//! A single container serves every chart; [`SeriesKind`] selects which
//! value shape it accepts:
//!
//! - `Price`: trade price plus an opacity weight
//! - `Spread`: bid and ask, either side possibly absent
//! - `Volume`: trade size
//!
//! Once `capacity` points are held, each append evicts exactly the oldest
//! point. The value bounds are recomputed over the whole buffer on every
//! append so an evicted extreme never lingers in the range.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Default number of points retained per series.
pub const DEFAULT_CAPACITY: usize = 2_500;

/// Fraction of the value span added above and below the padded range.
const RANGE_PAD_FRACTION: f64 = 0.1;

/// Padding used when every value is identical.
const FLAT_RANGE_PAD: f64 = 1.0;

/// Range reported by an empty series.
const EMPTY_RANGE: (f64, f64) = (0.0, 1.0);

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by series mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    /// Value shape does not match the series kind.
    #[error("cannot append {actual:?} value to {expected:?} series")]
    KindMismatch {
        /// Kind of the series.
        expected: SeriesKind,
        /// Kind of the rejected value.
        actual: SeriesKind,
    },

    /// Capacity must be positive.
    #[error("series capacity must be greater than zero")]
    ZeroCapacity,
}

// =============================================================================
// Values
// =============================================================================

/// Which derived fields a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    /// Trade price with opacity weight.
    Price,
    /// Bid/ask pair.
    Spread,
    /// Trade size.
    Volume,
}

impl SeriesKind {
    /// Channel name suffix for this kind.
    #[must_use]
    pub const fn channel_suffix(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Spread => "bidask",
            Self::Volume => "volume",
        }
    }
}

/// One sample's value columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesValue {
    /// Trade price and marker opacity.
    Price {
        /// Trade price.
        price: f64,
        /// Opacity in `[0.2, 1.0]`.
        weight: f64,
    },
    /// Quote sides. `None` means the quote carried no usable value.
    Spread {
        /// Bid price.
        bid: Option<f64>,
        /// Ask price.
        ask: Option<f64>,
    },
    /// Trade size.
    Volume {
        /// Shares or contracts.
        volume: f64,
    },
}

impl SeriesValue {
    /// Kind of series this value belongs in.
    #[must_use]
    pub const fn kind(&self) -> SeriesKind {
        match self {
            Self::Price { .. } => SeriesKind::Price,
            Self::Spread { .. } => SeriesKind::Spread,
            Self::Volume { .. } => SeriesKind::Volume,
        }
    }

    /// Values that participate in range computation.
    fn range_values(&self) -> impl Iterator<Item = f64> {
        let (first, second) = match *self {
            Self::Price { price, .. } => (Some(price), None),
            Self::Spread { bid, ask } => (bid, ask),
            Self::Volume { volume } => (Some(volume), None),
        };
        first.into_iter().chain(second)
    }
}

/// A timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Event time (or ingestion time when the event had none).
    pub timestamp: DateTime<Utc>,
    /// Value columns.
    pub value: SeriesValue,
}

// =============================================================================
// RollingSeries
// =============================================================================

/// Bounded FIFO of [`Point`]s with running value bounds.
#[derive(Debug, Clone)]
pub struct RollingSeries {
    kind: SeriesKind,
    capacity: usize,
    points: VecDeque<Point>,
    bounds: Option<(f64, f64)>,
}

impl RollingSeries {
    /// Create an empty series.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::ZeroCapacity`] when `capacity` is zero.
    pub fn new(kind: SeriesKind, capacity: usize) -> Result<Self, SeriesError> {
        if capacity == 0 {
            return Err(SeriesError::ZeroCapacity);
        }

        Ok(Self {
            kind,
            capacity,
            points: VecDeque::with_capacity(capacity),
            bounds: None,
        })
    }

    /// Create an empty series with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn with_default_capacity(kind: SeriesKind) -> Self {
        Self {
            kind,
            capacity: DEFAULT_CAPACITY,
            points: VecDeque::with_capacity(DEFAULT_CAPACITY),
            bounds: None,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::KindMismatch`] when `value` does not fit this
    /// series; the series is left unchanged.
    pub fn append(&mut self, timestamp: DateTime<Utc>, value: SeriesValue) -> Result<(), SeriesError> {
        if value.kind() != self.kind {
            return Err(SeriesError::KindMismatch {
                expected: self.kind,
                actual: value.kind(),
            });
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(Point { timestamp, value });
        self.recompute_bounds();

        Ok(())
    }

    /// Value range widened by 10% of its span on each side.
    ///
    /// A flat series is widened by `1.0`; an empty series reports `(0, 1)`.
    #[must_use]
    pub fn padded_range(&self) -> (f64, f64) {
        let Some((min, max)) = self.bounds else {
            return EMPTY_RANGE;
        };

        let span = max - min;
        let pad = if span == 0.0 {
            FLAT_RANGE_PAD
        } else {
            span * RANGE_PAD_FRACTION
        };
        (min - pad, max + pad)
    }

    /// Drop every point and return the bounds to `(0, 1)`.
    pub fn reset(&mut self) {
        self.points.clear();
        self.bounds = None;
    }

    /// Owned copy of the current points, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    /// Raw `(min, max)` over the value column, `(0, 1)` when empty or when
    /// no point has a value.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        self.bounds.unwrap_or(EMPTY_RANGE)
    }

    /// Most recent point.
    #[must_use]
    pub fn latest(&self) -> Option<&Point> {
        self.points.back()
    }

    /// Number of points held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when no points are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maximum number of points retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value shape accepted by this series.
    #[must_use]
    pub const fn kind(&self) -> SeriesKind {
        self.kind
    }

    fn recompute_bounds(&mut self) {
        self.bounds = self
            .points
            .iter()
            .flat_map(|point| point.value.range_values())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use proptest::prelude::*;

    use super::*;

    fn price(p: f64) -> SeriesValue {
        SeriesValue::Price {
            price: p,
            weight: 0.2,
        }
    }

    fn at(i: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + TimeDelta::seconds(i)
    }

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(
            RollingSeries::new(SeriesKind::Price, 0).unwrap_err(),
            SeriesError::ZeroCapacity
        );
    }

    #[test]
    fn default_capacity() {
        let series = RollingSeries::with_default_capacity(SeriesKind::Volume);
        assert_eq!(series.capacity(), 2_500);
        assert!(series.is_empty());
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut series = RollingSeries::new(SeriesKind::Price, 3).unwrap();
        for i in 0..5 {
            series.append(at(i), price(1.0)).unwrap();
        }

        let snapshot = series.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].timestamp, at(2));
        assert_eq!(snapshot[2].timestamp, at(4));
    }

    #[test]
    fn evicted_extreme_leaves_bounds() {
        let mut series = RollingSeries::new(SeriesKind::Price, 2).unwrap();
        series.append(at(0), price(100.0)).unwrap();
        series.append(at(1), price(10.0)).unwrap();
        series.append(at(2), price(20.0)).unwrap();

        assert_eq!(series.bounds(), (10.0, 20.0));
    }

    #[test]
    fn padded_range_ten_percent() {
        let mut series = RollingSeries::new(SeriesKind::Price, 10).unwrap();
        series.append(at(0), price(10.0)).unwrap();
        series.append(at(1), price(20.0)).unwrap();

        assert_eq!(series.padded_range(), (9.0, 21.0));
    }

    #[test]
    fn padded_range_flat_series() {
        let mut series = RollingSeries::new(SeriesKind::Price, 10).unwrap();
        series.append(at(0), price(5.0)).unwrap();

        assert_eq!(series.padded_range(), (4.0, 6.0));
    }

    #[test]
    fn padded_range_empty_series() {
        let series = RollingSeries::new(SeriesKind::Price, 10).unwrap();
        assert_eq!(series.padded_range(), (0.0, 1.0));
    }

    #[test]
    fn spread_bounds_cover_both_sides() {
        let mut series = RollingSeries::new(SeriesKind::Spread, 10).unwrap();
        series
            .append(at(0), SeriesValue::Spread { bid: Some(9.5), ask: Some(10.5) })
            .unwrap();
        series
            .append(at(1), SeriesValue::Spread { bid: Some(9.0), ask: None })
            .unwrap();

        assert_eq!(series.bounds(), (9.0, 10.5));
    }

    #[test]
    fn spread_without_values_keeps_empty_bounds() {
        let mut series = RollingSeries::new(SeriesKind::Spread, 10).unwrap();
        series
            .append(at(0), SeriesValue::Spread { bid: None, ask: None })
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.padded_range(), (0.0, 1.0));
    }

    #[test]
    fn kind_mismatch_leaves_series_untouched() {
        let mut series = RollingSeries::new(SeriesKind::Volume, 10).unwrap();
        let err = series.append(at(0), price(1.0)).unwrap_err();

        assert_eq!(
            err,
            SeriesError::KindMismatch {
                expected: SeriesKind::Volume,
                actual: SeriesKind::Price
            }
        );
        assert!(series.is_empty());
    }

    #[test]
    fn reset_clears_points_and_bounds() {
        let mut series = RollingSeries::new(SeriesKind::Volume, 10).unwrap();
        series.append(at(0), SeriesValue::Volume { volume: 300.0 }).unwrap();
        series.reset();

        assert!(series.is_empty());
        assert_eq!(series.bounds(), (0.0, 1.0));
        assert!(series.latest().is_none());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut series = RollingSeries::new(SeriesKind::Volume, 10).unwrap();
        series.append(at(0), SeriesValue::Volume { volume: 1.0 }).unwrap();
        let snapshot = series.snapshot();
        series.append(at(1), SeriesValue::Volume { volume: 2.0 }).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(series.len(), 2);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 1usize..64, appends in 0usize..256) {
            let mut series = RollingSeries::new(SeriesKind::Volume, capacity).unwrap();
            for i in 0..appends {
                series
                    .append(at(i64::try_from(i).unwrap()), SeriesValue::Volume { volume: 1.0 })
                    .unwrap();
                prop_assert!(series.len() <= capacity);
            }
            prop_assert_eq!(series.len(), appends.min(capacity));
        }

        #[test]
        fn bounds_match_retained_points(values in proptest::collection::vec(0.0f64..1_000.0, 1..50)) {
            let mut series = RollingSeries::new(SeriesKind::Volume, 16).unwrap();
            for (i, v) in values.iter().enumerate() {
                series
                    .append(at(i64::try_from(i).unwrap()), SeriesValue::Volume { volume: *v })
                    .unwrap();
            }

            let retained = &values[values.len().saturating_sub(16)..];
            let min = retained.iter().copied().fold(f64::INFINITY, f64::min);
            let max = retained.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(series.bounds(), (min, max));
        }
    }
}
