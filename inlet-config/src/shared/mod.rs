//! Shared configuration types for the inlet ingestion engine.

mod source;

pub use source::{InputConfig, SourceConfig, ValidationError};
