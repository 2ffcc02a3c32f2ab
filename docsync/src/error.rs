//! Error types and result definitions for docsync operations.
//!
//! A single [`SyncError`] type carries an [`ErrorKind`] classification, a static description,
//! optional dynamic detail, an optional source error and the callsite where it was raised.
//! Errors of several partition workers can be aggregated into one value.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout docsync.
pub type SyncResult<T> = Result<T, SyncError>;

/// Detailed payload stored for single [`SyncError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of docsync.
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Multiple aggregated errors, used to report the failures of several workers at once.
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors raised while synchronizing and querying documents.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Message Errors
    MessageDecodeFailed,
    PayloadProjectionFailed,
    UnknownTable,

    // Store Errors
    StoreConnectionFailed,
    StoreReadFailed,
    StoreWriteFailed,
    DocumentNotFound,

    // Transport Errors
    TransportFailed,

    // State & Workflow Errors
    InvalidState,
    ConfigError,
    WorkerPanic,

    // Serialization Errors
    SerializationError,
    DeserializationError,

    Unknown,
}

impl ErrorKind {
    /// Returns `true` for failures to decode a change message envelope.
    pub fn is_decode(&self) -> bool {
        matches!(self, ErrorKind::MessageDecodeFailed)
    }

    /// Returns `true` for failures to project a payload into a normalized change.
    pub fn is_projection(&self) -> bool {
        matches!(
            self,
            ErrorKind::PayloadProjectionFailed | ErrorKind::UnknownTable
        )
    }

    /// Returns `true` for failures of the document store.
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            ErrorKind::StoreConnectionFailed
                | ErrorKind::StoreReadFailed
                | ErrorKind::StoreWriteFailed
        )
    }

    /// Returns a stable snake case label, used for metric labels and log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::MessageDecodeFailed => "message_decode_failed",
            ErrorKind::PayloadProjectionFailed => "payload_projection_failed",
            ErrorKind::UnknownTable => "unknown_table",
            ErrorKind::StoreConnectionFailed => "store_connection_failed",
            ErrorKind::StoreReadFailed => "store_read_failed",
            ErrorKind::StoreWriteFailed => "store_write_failed",
            ErrorKind::DocumentNotFound => "document_not_found",
            ErrorKind::TransportFailed => "transport_failed",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::WorkerPanic => "worker_panic",
            ErrorKind::SerializationError => "serialization_error",
            ErrorKind::DeserializationError => "deserialization_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the list is empty.
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

    /// Returns the static description of this error.
    ///
    /// Aggregated errors return the description of their first error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.description.as_ref(),
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the dynamic detail of this error, if any.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
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

    /// Returns the callsite where this error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
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

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => errors_a == errors_b,
            _ => false,
        }
    }
}

impl Hash for SyncError {
    /// Hashes only the kind and static description so that occurrences of the same failure
    /// group together regardless of location or detail.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

                write_detail(payload.detail.as_deref(), f)?;
                write_backtrace(payload.backtrace.as_ref(), f)?;

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
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    if detail.trim().is_empty() {
        return write!(f, "\n  Detail: <empty>");
    }

    write!(f, "\n  Detail:")?;
    for line in detail.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rendered = backtrace.to_string();
    if rendered.trim().is_empty() {
        return Ok(());
    }

    write!(f, "\n  Backtrace:")?;
    for line in rendered.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates several errors into one.
///
/// A vector holding exactly one error yields that error unwrapped.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();

        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`serde_json::Error`] into a serialization or deserialization [`SyncError`].
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => {
                (ErrorKind::SerializationError, "JSON serialization failed")
            }
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DeserializationError, "JSON deserialization failed")
            }
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`reqwest::Error`] into a store [`SyncError`].
///
/// Connection failures and timeouts map to [`ErrorKind::StoreConnectionFailed`], everything
/// else to [`ErrorKind::StoreReadFailed`]. Write paths re-classify through their own context.
#[cfg(feature = "elasticsearch")]
impl From<reqwest::Error> for SyncError {
    #[track_caller]
    fn from(err: reqwest::Error) -> SyncError {
        let (kind, description) = if err.is_connect() || err.is_timeout() {
            (ErrorKind::StoreConnectionFailed, "index connection failed")
        } else if err.is_decode() {
            (ErrorKind::DeserializationError, "index response decoding failed")
        } else {
            (ErrorKind::StoreReadFailed, "index request failed")
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio_postgres::Error`] into a transport [`SyncError`].
#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for SyncError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> SyncError {
        let description = if err.is_closed() {
            "notification connection closed"
        } else {
            "notification connection failed"
        };

        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::TransportFailed,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`rustls::Error`] into a configuration [`SyncError`].
#[cfg(feature = "postgres")]
impl From<rustls::Error> for SyncError {
    #[track_caller]
    fn from(err: rustls::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("TLS configuration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::hash::DefaultHasher;

    use super::*;
    use crate::{bail, sync_error};

    #[test]
    fn display_renders_kind_description_and_detail() {
        let err = sync_error!(
            ErrorKind::StoreWriteFailed,
            "document update failed",
            "owner 7"
        );
        let rendered = err.to_string();

        assert!(rendered.starts_with("[StoreWriteFailed] document update failed @ "));
        assert!(rendered.contains("Detail:\n    owner 7"));
        assert_eq!(err.detail(), Some("owner 7"));
    }

    #[test]
    fn single_error_vector_is_unwrapped() {
        let err = SyncError::from(vec![sync_error!(ErrorKind::WorkerPanic, "boom")]);

        assert_eq!(err.kind(), ErrorKind::WorkerPanic);
        assert_eq!(err.kinds(), vec![ErrorKind::WorkerPanic]);
    }

    #[test]
    fn aggregated_errors_expose_all_kinds() {
        let err = SyncError::from(vec![
            sync_error!(ErrorKind::StoreReadFailed, "read failed"),
            sync_error!(ErrorKind::WorkerPanic, "worker panicked"),
        ]);

        assert_eq!(err.kind(), ErrorKind::StoreReadFailed);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::StoreReadFailed, ErrorKind::WorkerPanic]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated @ "));
    }

    #[test]
    fn hash_ignores_detail() {
        fn hash_of(err: &SyncError) -> u64 {
            let mut hasher = DefaultHasher::new();
            err.hash(&mut hasher);
            hasher.finish()
        }

        let a = sync_error!(ErrorKind::StoreReadFailed, "read failed", "a");
        let b = sync_error!(ErrorKind::StoreReadFailed, "read failed", "b");

        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn kinds_are_classified() {
        assert!(ErrorKind::MessageDecodeFailed.is_decode());
        assert!(ErrorKind::UnknownTable.is_projection());
        assert!(ErrorKind::StoreWriteFailed.is_store());
        assert!(!ErrorKind::DocumentNotFound.is_store());
    }

    #[test]
    fn bail_returns_early() {
        fn fails() -> SyncResult<()> {
            bail!(ErrorKind::InvalidState, "pipeline already started");
        }

        assert_eq!(fails().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn serde_errors_map_to_deserialization() {
        let err: SyncError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
        assert!(error::Error::source(&err).is_some());
    }
}
