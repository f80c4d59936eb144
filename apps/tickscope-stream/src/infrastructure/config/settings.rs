//! Tickscope Configuration Settings
//!
//! Configuration types for the ingestion core, loaded from environment
//! variables (after `.env` has been applied by the binary).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::event::SymbolClass;
use crate::domain::series::DEFAULT_CAPACITY;
use crate::domain::ticker::{OptionContract, TickerError};
use crate::infrastructure::polygon::auth::{AUTH_TIMEOUT, ApiKey, AuthError};

/// Default equity symbol.
pub const DEFAULT_STOCK_SYMBOL: &str = "TSLA";

/// Default option contract.
pub const DEFAULT_OPTION_SYMBOL: &str = "TSLA240315C00220000";

/// Polygon stocks cluster.
pub const DEFAULT_STOCK_WS_URL: &str = "wss://socket.polygon.io/stocks";

/// Polygon options cluster.
pub const DEFAULT_OPTION_WS_URL: &str = "wss://socket.polygon.io/options";

/// Primary and legacy names of the API key variable.
const API_KEY_VARS: [&str; 2] = ["POLYGON_API_KEY", "POLYGONIO_API_KEY"];

/// Settings for one market data feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Asset class carried by the feed.
    pub symbol_class: SymbolClass,
    /// WebSocket endpoint.
    pub url: String,
    /// Symbol subscribed at startup.
    pub symbol: String,
}

/// WebSocket connection tuning shared by all feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Time allowed to receive `auth_success`.
    pub auth_timeout: Duration,
    /// Interval between client pings.
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead.
    pub idle_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0, // Unlimited
            auth_timeout: AUTH_TIMEOUT,
            ping_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl ConnectionSettings {
    /// Check the liveness timers.
    ///
    /// # Errors
    ///
    /// Returns an error if the ping interval or idle timeout is zero, or the
    /// idle timeout does not exceed the ping interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "TICKSCOPE_PING_INTERVAL_SECS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.idle_timeout <= self.ping_interval {
            return Err(ConfigError::Invalid {
                key: "TICKSCOPE_IDLE_TIMEOUT_SECS".to_string(),
                reason: format!(
                    "must exceed the ping interval ({}s)",
                    self.ping_interval.as_secs()
                ),
            });
        }
        Ok(())
    }
}

/// Complete ingestion configuration.
#[derive(Debug, Clone)]
pub struct TickscopeConfig {
    /// Polygon API key.
    pub api_key: ApiKey,
    /// Equity feed.
    pub stock: FeedSettings,
    /// Option feed.
    pub option: FeedSettings,
    /// Subscribe to quotes as well as trades.
    pub subscribe_quotes: bool,
    /// Points retained per series.
    pub series_capacity: usize,
    /// Exchange reference file.
    pub exchanges_path: PathBuf,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
    /// Connection tuning.
    pub connection: ConnectionSettings,
}

impl TickscopeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or a value is invalid.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Source(lookup);

        let (key_var, raw_key) = API_KEY_VARS
            .iter()
            .find_map(|var| env.get(var).map(|value| (*var, value)))
            .ok_or_else(|| ConfigError::MissingEnvVar(API_KEY_VARS[0].to_string()))?;
        let api_key = ApiKey::new(raw_key).map_err(|err| match err {
            AuthError::EmptyKey => ConfigError::EmptyValue(key_var.to_string()),
            other => ConfigError::Invalid {
                key: key_var.to_string(),
                reason: other.to_string(),
            },
        })?;

        let stock = FeedSettings {
            symbol_class: SymbolClass::Equity,
            url: env.string("TICKSCOPE_STOCK_WS_URL", DEFAULT_STOCK_WS_URL),
            symbol: env
                .string("TICKSCOPE_STOCK_SYMBOL", DEFAULT_STOCK_SYMBOL)
                .to_ascii_uppercase(),
        };

        let option_symbol = env.string("TICKSCOPE_OPTION_SYMBOL", DEFAULT_OPTION_SYMBOL);
        let contract = OptionContract::parse(&option_symbol)
            .map_err(ConfigError::InvalidOptionSymbol)?;
        let option = FeedSettings {
            symbol_class: SymbolClass::Option,
            url: env.string("TICKSCOPE_OPTION_WS_URL", DEFAULT_OPTION_WS_URL),
            symbol: contract.occ_symbol(),
        };

        let series_capacity = env.parse_or("TICKSCOPE_SERIES_CAPACITY", DEFAULT_CAPACITY);
        if series_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "TICKSCOPE_SERIES_CAPACITY".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            reconnect_delay_initial: env.millis_or(
                "TICKSCOPE_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.secs_or(
                "TICKSCOPE_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse_or(
                "TICKSCOPE_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse_or(
                "TICKSCOPE_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            auth_timeout: env.secs_or("TICKSCOPE_AUTH_TIMEOUT_SECS", defaults.auth_timeout),
            ping_interval: env.secs_or("TICKSCOPE_PING_INTERVAL_SECS", defaults.ping_interval),
            idle_timeout: env.secs_or("TICKSCOPE_IDLE_TIMEOUT_SECS", defaults.idle_timeout),
        };
        connection.validate()?;

        Ok(Self {
            api_key,
            stock,
            option,
            subscribe_quotes: env.bool_or("TICKSCOPE_SUBSCRIBE_QUOTES", true),
            series_capacity,
            exchanges_path: PathBuf::from(env.string("TICKSCOPE_EXCHANGES_PATH", "exchanges.json")),
            metrics_port: env.parse_or("TICKSCOPE_METRICS_PORT", 9090),
            connection,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Option symbol is not a valid OCC contract.
    #[error("invalid TICKSCOPE_OPTION_SYMBOL: {0}")]
    InvalidOptionSymbol(#[from] TickerError),
    /// Value is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Variable lookup with typed fallbacks. Unparseable values use the default.
struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            })
    }

    fn secs_or(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis_or(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
