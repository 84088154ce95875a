//! Error types and result definitions for ingestion operations.
//!
//! Provides a central error system with classification, aggregation, and
//! captured diagnostic metadata. The [`IngestError`] type supports single
//! errors, errors with additional detail, and multiple aggregated errors for
//! worker failure scenarios.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for ingestion operations using [`IngestError`].
pub type IngestResult<T> = Result<T, IngestError>;

/// Detailed payload stored for single [`IngestError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for ingestion operations.
///
/// [`IngestError`] can represent a single classified error or multiple
/// aggregated errors, while capturing the callsite and a backtrace for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct IngestError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    ///
    /// This variant is mainly useful to capture multiple worker failures.
    Many {
        errors: Vec<IngestError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur during ingestion.
///
/// Error kinds are organized by functional area and failure mode so that
/// callers can choose an appropriate handling strategy.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Transport errors
    DownloadFailed,

    // Downstream delivery errors
    PublishFailed,

    // Content & conversion errors
    SerializationError,
    DeserializationError,
    ConversionError,
    UnsupportedContent,

    // Configuration errors
    ConfigError,
    ValidationError,

    // State & workflow errors
    InvalidState,
    WorkerPanic,

    // IO errors
    IoError,

    // Unknown / uncategorized
    Unknown,
}

impl IngestError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or
    /// [`ErrorKind::Unknown`] if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For aggregated errors, returns the detail of the first error that has
    /// one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] and returns the modified
    /// instance.
    ///
    /// The stored source is preserved across clones and exposed via
    /// [`error::Error::source`]. Has no effect on aggregated errors, which
    /// forward their first contained error as the source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates an [`IngestError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        IngestError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for IngestError {
    fn eq(&self, other: &IngestError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail: {detail}")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for IngestError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            // For aggregated errors, we forward the first contained error as the source.
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates an [`IngestError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for IngestError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> IngestError {
        IngestError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates an [`IngestError`] from an error kind, static description, and
/// dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for IngestError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> IngestError {
        IngestError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates an [`IngestError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly
/// without wrapping it in the aggregated variant.
impl<E> From<Vec<E>> for IngestError
where
    E: Into<IngestError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> IngestError {
        let location = Location::caller();

        let mut errors: Vec<IngestError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            return errors.pop().expect("just checked length is 1");
        }

        IngestError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`IngestError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for IngestError {
    #[track_caller]
    fn from(err: std::io::Error) -> IngestError {
        let detail = err.to_string();
        let source = Arc::new(err);
        IngestError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`serde_json::Error`] to [`IngestError`] with the appropriate
/// error kind based on error classification.
impl From<serde_json::Error> for IngestError {
    #[track_caller]
    fn from(err: serde_json::Error) -> IngestError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        let source = Arc::new(err);
        IngestError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest_error;

    #[test]
    fn single_error_exposes_kind_and_detail() {
        let err = ingest_error!(
            ErrorKind::DownloadFailed,
            "Blob download failed",
            "connection reset"
        );

        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(err.detail(), Some("connection reset"));
        assert_eq!(err.kinds(), vec![ErrorKind::DownloadFailed]);
    }

    #[test]
    fn aggregated_error_flattens_kinds() {
        let errors = vec![
            ingest_error!(ErrorKind::DownloadFailed, "Blob download failed"),
            ingest_error!(ErrorKind::PublishFailed, "Event publish failed"),
        ];
        let err = IngestError::from(errors);

        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::DownloadFailed, ErrorKind::PublishFailed]
        );
    }

    #[test]
    fn single_element_vector_is_not_wrapped() {
        let err =
            IngestError::from(vec![ingest_error!(ErrorKind::InvalidState, "Pool stopped")]);

        assert_eq!(err.kinds(), vec![ErrorKind::InvalidState]);
    }

    #[test]
    fn io_error_maps_to_io_kind() {
        let err = IngestError::from(std::io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::IoError);
    }
}
