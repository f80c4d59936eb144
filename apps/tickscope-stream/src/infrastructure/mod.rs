//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete feed clients, the stock consumer context, and the ambient
//! configuration, metrics and telemetry plumbing.

/// Polygon WebSocket feed adapters (stocks, options).
pub mod polygon;

/// Channel-backed consumer execution context.
pub mod context;

/// Exchange id to name directory.
pub mod exchanges;

/// Environment-driven configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing setup.
pub mod telemetry;
