//! Error types and result definitions for the streaming core.
//!
//! [`StreamError`] carries a classified [`ErrorKind`], a static description, optional
//! dynamic detail and source, and the callsite where it was raised. Errors coming from
//! several threads at shutdown are aggregated into a single value.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

use rmevents_config::shared::ValidationError;

/// Result type used throughout the streaming core.
pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the streaming core.
#[derive(Debug, Clone)]
pub struct StreamError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors collected from several worker threads.
    Many {
        errors: Vec<StreamError>,
        location: &'static Location<'static>,
    },
}

/// Classification of everything that can go wrong in the streaming core.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Resource exhaustion, the fragment is dropped
    MessagePoolExhausted,
    StringArenaFull,

    // Fragment construction, the fragment is dropped
    MissingColumn,
    ColumnTypeMismatch,
    FieldIndexOutOfRange,
    InvalidCorrelationId,

    // Protocol violations, fatal for the handler
    DuplicateFragment,
    FanOutMismatch,
    IncompleteBucketRemoval,
    ReclaimProtocolViolation,

    // Collaborators
    SourceError,
    SinkError,

    // Lifecycle
    InvalidState,
    ListenerThreadPanic,
    HandlerThreadPanic,
    ThreadSpawnFailed,

    // Configuration & IO
    ConfigError,
    IoError,

    Unknown,

    // Raised only by fail points in tests.
    #[cfg(feature = "failpoints")]
    InjectedFragmentFailure,
    #[cfg(feature = "failpoints")]
    InjectedSinkFailure,
}

impl ErrorKind {
    /// Returns `true` when the error only invalidates the fragment being built.
    ///
    /// The listener drops such fragments, counts them and keeps running.
    pub fn drops_fragment(&self) -> bool {
        match self {
            ErrorKind::MessagePoolExhausted
            | ErrorKind::StringArenaFull
            | ErrorKind::MissingColumn
            | ErrorKind::ColumnTypeMismatch
            | ErrorKind::FieldIndexOutOfRange
            | ErrorKind::InvalidCorrelationId => true,
            #[cfg(feature = "failpoints")]
            ErrorKind::InjectedFragmentFailure => true,
            _ => false,
        }
    }

    /// Returns `true` for violated join invariants, which indicate corrupted upstream data.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ErrorKind::DuplicateFragment
                | ErrorKind::FanOutMismatch
                | ErrorKind::IncompleteBucketRemoval
                | ErrorKind::ReclaimProtocolViolation
        )
    }

    /// Short label used for the `reason` metric label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::MessagePoolExhausted => "pool_exhausted",
            ErrorKind::StringArenaFull => "string_arena_full",
            ErrorKind::MissingColumn => "missing_column",
            ErrorKind::ColumnTypeMismatch => "column_type_mismatch",
            ErrorKind::FieldIndexOutOfRange => "field_index_out_of_range",
            ErrorKind::InvalidCorrelationId => "invalid_correlation_id",
            ErrorKind::SinkError => "sink_error",
            #[cfg(feature = "failpoints")]
            ErrorKind::InjectedFragmentFailure | ErrorKind::InjectedSinkFailure => "injected",
            _ => "other",
        }
    }
}

impl StreamError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the dynamic detail, or the first one found among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace of a single error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error. Has no effect on aggregated errors.
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
        StreamError {
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

impl PartialEq for StreamError {
    fn eq(&self, other: &StreamError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Hash for StreamError {
    /// Hashes the kind and static description only, so repeated occurrences group together.
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

impl fmt::Display for StreamError {
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

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail:", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace:", &backtrace)?;
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

fn write_indented(f: &mut fmt::Formatter<'_>, header: &str, body: &str) -> fmt::Result {
    write!(f, "\n  {header}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for StreamError {
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

impl From<(ErrorKind, &'static str)> for StreamError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> StreamError {
        StreamError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for StreamError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> StreamError {
        StreamError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for StreamError
where
    E: Into<StreamError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> StreamError {
        let location = Location::caller();
        let mut errors: Vec<StreamError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        StreamError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for StreamError {
    #[track_caller]
    fn from(err: std::io::Error) -> StreamError {
        let detail = err.to_string();
        StreamError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<ValidationError> for StreamError {
    #[track_caller]
    fn from(err: ValidationError) -> StreamError {
        let detail = err.to_string();
        StreamError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid streaming configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, stream_error};

    fn failing(kind: ErrorKind) -> StreamResult<()> {
        bail!(kind, "Operation failed", format!("kind {kind:?}"));
    }

    #[test]
    fn single_error_exposes_kind_detail_and_location() {
        let err = failing(ErrorKind::DuplicateFragment).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DuplicateFragment);
        assert_eq!(err.detail(), Some("kind DuplicateFragment"));
        assert!(err.location().file().ends_with("error.rs"));
        assert!(err.to_string().contains("[DuplicateFragment] Operation failed"));
    }

    #[test]
    fn aggregated_errors_flatten_kinds() {
        let err: StreamError = vec![
            stream_error!(ErrorKind::FanOutMismatch, "first"),
            vec![
                stream_error!(ErrorKind::SinkError, "second"),
                stream_error!(ErrorKind::HandlerThreadPanic, "third"),
            ]
            .into(),
        ]
        .into();

        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::FanOutMismatch,
                ErrorKind::SinkError,
                ErrorKind::HandlerThreadPanic
            ]
        );
        assert_eq!(err.kind(), ErrorKind::FanOutMismatch);
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn vec_with_one_error_is_not_wrapped() {
        let err: StreamError = vec![stream_error!(ErrorKind::SourceError, "only")].into();

        assert!(err.backtrace().is_some());
        assert_eq!(err.kinds(), vec![ErrorKind::SourceError]);
    }

    #[test]
    fn classifies_fragment_local_and_protocol_errors() {
        assert!(ErrorKind::StringArenaFull.drops_fragment());
        assert!(ErrorKind::MessagePoolExhausted.drops_fragment());
        assert!(!ErrorKind::DuplicateFragment.drops_fragment());
        assert!(ErrorKind::IncompleteBucketRemoval.is_protocol_violation());
        assert!(!ErrorKind::SinkError.is_protocol_violation());
    }

    #[test]
    fn validation_errors_become_config_errors() {
        let err: StreamError = ValidationError::MissingSource("resource".to_string()).into();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert!(error::Error::source(&err).is_some());
    }
}
