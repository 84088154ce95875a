//! Downstream event delivery.
//!
//! Jobs hand every finished blob to a [`base::Publisher`] together with the
//! checkpoint snapshot taken after the blob was recorded in the source state.
//! The [`memory`] implementation captures events for tests and development.

pub mod base;
pub mod memory;

pub use base::Publisher;
pub use memory::MemoryPublisher;
