//! Configuration loading and shared configuration types for the inlet
//! ingestion engine.
//!
//! Configuration is assembled from a `configuration/` directory (base file
//! plus an environment-specific overlay) and `APP_`-prefixed environment
//! variables. The [`shared`] module holds the serde types consumed by the
//! engine itself.

pub mod environment;
pub mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config};
