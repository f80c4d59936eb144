//! Ticker Parsing
//!
//! Distinguishes plain equity tickers from OCC option contract symbols
//! and validates the latter before they are subscribed.
//!
//! # OCC Layout
//!
//! ```text
//! TSLA  240315  C  00220000
//! root  YYMMDD  C/P strike * 1000 (8 digits)
//! ```
//!
//! The root is 1-6 uppercase letters, so a full symbol is 16-21 characters.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Shortest valid OCC symbol (1-letter root).
const MIN_OCC_LEN: usize = 16;

/// Longest valid OCC symbol (6-letter root).
const MAX_OCC_LEN: usize = 21;

/// Characters after the root: date (6) + right (1) + strike (8).
const OCC_SUFFIX_LEN: usize = 15;

/// Implied decimal places in the strike field.
const STRIKE_SCALE: u32 = 3;

// =============================================================================
// Errors
// =============================================================================

/// Why a symbol is not a valid option contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerError {
    /// Symbol length outside 16-21 characters.
    #[error("option symbol must be {MIN_OCC_LEN}-{MAX_OCC_LEN} characters, got {0}")]
    Length(usize),

    /// Root is not 1-6 uppercase ASCII letters.
    #[error("invalid underlying root: {0:?}")]
    BadRoot(String),

    /// Expiration is not a real `YYMMDD` date.
    #[error("invalid expiration date: {0:?}")]
    BadDate(String),

    /// Right is neither `C` nor `P`.
    #[error("invalid option right: {0:?}")]
    BadFlag(char),

    /// Strike is not eight digits.
    #[error("invalid strike: {0:?}")]
    BadStrike(String),
}

// =============================================================================
// Types
// =============================================================================

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionRight {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionRight {
    const fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'C' => Some(Self::Call),
            'P' => Some(Self::Put),
            _ => None,
        }
    }

    /// OCC flag character.
    #[must_use]
    pub const fn flag(self) -> char {
        match self {
            Self::Call => 'C',
            Self::Put => 'P',
        }
    }
}

/// A parsed OCC option contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionContract {
    /// Underlying root symbol.
    pub underlying: String,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Call or put.
    pub right: OptionRight,
    /// Strike price.
    pub strike: Decimal,
}

impl OptionContract {
    /// Parse and validate an OCC symbol.
    ///
    /// # Errors
    ///
    /// Returns the first [`TickerError`] found, checking length, root,
    /// date, right and strike in that order.
    pub fn parse(symbol: &str) -> Result<Self, TickerError> {
        let symbol = symbol.trim();
        let len = symbol.chars().count();
        if !(MIN_OCC_LEN..=MAX_OCC_LEN).contains(&len) {
            return Err(TickerError::Length(len));
        }
        if !symbol.is_ascii() {
            return Err(TickerError::BadRoot(symbol.to_string()));
        }

        let (root, rest) = symbol.split_at(len - OCC_SUFFIX_LEN);
        let (date, rest) = rest.split_at(6);
        let (flag, strike) = rest.split_at(1);

        if !root.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(TickerError::BadRoot(root.to_string()));
        }

        let expiration = if date.bytes().all(|b| b.is_ascii_digit()) {
            NaiveDate::parse_from_str(date, "%y%m%d")
                .map_err(|_| TickerError::BadDate(date.to_string()))?
        } else {
            return Err(TickerError::BadDate(date.to_string()));
        };

        let flag = flag.chars().next().unwrap_or_default();
        let right = OptionRight::from_flag(flag).ok_or(TickerError::BadFlag(flag))?;

        if !strike.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TickerError::BadStrike(strike.to_string()));
        }
        let strike_units: i64 = strike
            .parse()
            .map_err(|_| TickerError::BadStrike(strike.to_string()))?;

        Ok(Self {
            underlying: root.to_string(),
            expiration,
            right,
            strike: Decimal::new(strike_units, STRIKE_SCALE),
        })
    }

    /// Canonical OCC symbol.
    #[must_use]
    pub fn occ_symbol(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = (self.strike * Decimal::from(1000))
            .trunc()
            .to_i64()
            .unwrap_or_default();
        write!(
            f,
            "{}{}{}{:08}",
            self.underlying,
            self.expiration.format("%y%m%d"),
            self.right.flag(),
            units
        )
    }
}

/// A symbol entered by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ticker {
    /// Plain equity ticker.
    Equity(String),
    /// Option contract.
    Option(OptionContract),
}

/// Classify a user-entered symbol.
///
/// Anything that parses as an OCC contract is an option; everything else is
/// treated as an equity ticker (upper-cased).
#[must_use]
pub fn parse_ticker(input: &str) -> Ticker {
    let input = input.trim();
    OptionContract::parse(input).map_or_else(
        |_| Ticker::Equity(input.to_ascii_uppercase()),
        Ticker::Option,
    )
}
