//! Macros for ingestion error handling.
//!
//! Convenience macros for creating and returning [`crate::error::IngestError`]
//! instances with reduced boilerplate.

/// Creates an [`crate::error::IngestError`] from an error kind and description.
///
/// Accepts an optional dynamic detail (third argument) and an optional source
/// error (`source:` argument).
#[macro_export]
macro_rules! ingest_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::IngestError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::IngestError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::IngestError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Creates and returns an [`crate::error::IngestError`] from the current
/// function.
///
/// Combines error creation with early return. Supports the same optional
/// detail and source arguments as [`ingest_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::ingest_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::ingest_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::ingest_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::ingest_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
