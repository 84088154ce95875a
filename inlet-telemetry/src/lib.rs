//! Telemetry initialization for the inlet ingestion engine.
//!
//! Provides tracing-subscriber setup for structured logging and a Prometheus
//! recorder for the `metrics` macros used throughout the engine.

pub mod metrics;
pub mod tracing;
