//! Error type shared by every roster component.
//!
//! [`RosterError`] classifies failures with an [`ErrorKind`], records where the error was
//! raised and can aggregate several errors, which is how worker pool shutdown reports the
//! failures of individual workers.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for roster operations.
pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
///
/// Holds either a single classified error or a list of aggregated errors.
#[derive(Debug, Clone)]
pub struct RosterError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<RosterError>,
        location: &'static Location<'static>,
    },
}

/// Classification of roster failures.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Store
    StoreConnectionFailed,
    StoreQueryFailed,

    // Command queue
    QueueAcceptFailed,
    QueueDeliveryFailed,

    // Ingestion
    UploadFailed,
    CsvParseFailed,

    // Data
    InvalidData,
    ConversionError,

    // IO & serialization
    IoError,
    SerializationError,
    DeserializationError,

    // Authentication
    AuthenticationError,
    AdminNotFound,
    InvalidCredentials,
    PasswordHashingFailed,

    // Push
    PushTransportFailed,

    // Workers & lifecycle
    MutationWorkerPanic,
    IngestionReaderPanic,
    PushServerPanic,
    InvalidState,
    ConfigError,

    Unknown,
}

impl RosterError {
    /// Returns the kind of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.kind,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(RosterError::kind)
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every kind contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single(payload) => vec![payload.kind],
            ErrorRepr::Many { errors, .. } => errors.iter().flat_map(RosterError::kinds).collect(),
        }
    }

    pub fn description(&self) -> &str {
        match &self.repr {
            ErrorRepr::Single(payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the dynamic detail, or the first one found among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.detail.as_deref(),
            ErrorRepr::Many { errors, .. } => errors.iter().find_map(RosterError::detail),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.repr {
            ErrorRepr::Single(payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(payload) = &mut self.repr {
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
        RosterError {
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

    #[track_caller]
    fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        RosterError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for RosterError {
    fn eq(&self, other: &RosterError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for RosterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    payload.location.file(),
                    payload.location.line(),
                )?;
                if let Some(detail) = &payload.detail {
                    write!(f, ": {detail}")?;
                }
                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}",
                    errors.len(),
                    if errors.len() == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                )?;
                for (index, error) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {error}", index + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl error::Error for RosterError {
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

impl From<(ErrorKind, &'static str)> for RosterError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> RosterError {
        RosterError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for RosterError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> RosterError {
        RosterError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for RosterError
where
    E: Into<RosterError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> RosterError {
        let location = Location::caller();
        let mut errors: Vec<RosterError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        RosterError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for RosterError {
    #[track_caller]
    fn from(err: std::io::Error) -> RosterError {
        RosterError::wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for RosterError {
    #[track_caller]
    fn from(err: serde_json::Error) -> RosterError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };
        RosterError::wrap(kind, description, err)
    }
}

/// Maps connection and pool failures apart from query failures.
impl From<sqlx::Error> for RosterError {
    #[track_caller]
    fn from(err: sqlx::Error) -> RosterError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => ErrorKind::StoreConnectionFailed,
            _ => ErrorKind::StoreQueryFailed,
        };
        RosterError::wrap(kind, "Database operation failed", err)
    }
}

/// Separates transport failures of the uploaded stream from malformed content.
impl From<csv::Error> for RosterError {
    #[track_caller]
    fn from(err: csv::Error) -> RosterError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::UploadFailed, "Upload stream failed"),
            _ => (ErrorKind::CsvParseFailed, "CSV parsing failed"),
        };
        RosterError::wrap(kind, description, err)
    }
}

impl From<uuid::Error> for RosterError {
    #[track_caller]
    fn from(err: uuid::Error) -> RosterError {
        RosterError::wrap(ErrorKind::ConversionError, "UUID parsing failed", err)
    }
}

impl From<jsonwebtoken::errors::Error> for RosterError {
    #[track_caller]
    fn from(err: jsonwebtoken::errors::Error) -> RosterError {
        RosterError::wrap(ErrorKind::AuthenticationError, "Token processing failed", err)
    }
}

impl From<bcrypt::BcryptError> for RosterError {
    #[track_caller]
    fn from(err: bcrypt::BcryptError) -> RosterError {
        RosterError::wrap(ErrorKind::PasswordHashingFailed, "Password hashing failed", err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RosterError {
    #[track_caller]
    fn from(err: tokio_tungstenite::tungstenite::Error) -> RosterError {
        RosterError::wrap(ErrorKind::PushTransportFailed, "Websocket transport failed", err)
    }
}
