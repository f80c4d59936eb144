//! Configuration Module
//!
//! Environment-driven configuration for the ingestion core.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DEFAULT_OPTION_SYMBOL, DEFAULT_OPTION_WS_URL,
    DEFAULT_STOCK_SYMBOL, DEFAULT_STOCK_WS_URL, FeedSettings, TickscopeConfig,
};
