use derive_more::Display;
use quarry_core::error::{ErrorClass, QueryError};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    /// Whether the caller can still answer the query by evaluating the
    /// stream in memory.
    #[must_use]
    pub const fn is_fallback_candidate(&self) -> bool {
        matches!(self.kind, ErrorKind::Unresolved | ErrorKind::Unsupported)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        let origin = match &err {
            QueryError::Config(_) => ErrorOrigin::Config,
            QueryError::Render(_) => ErrorOrigin::Render,
            QueryError::Translate(_) => ErrorOrigin::Translate,
            QueryError::UnknownEntity(_) | QueryError::UnsupportedOperation { .. } => {
                ErrorOrigin::Fold
            }
        };
        let kind = match err.class() {
            ErrorClass::Config => ErrorKind::Config,
            ErrorClass::InvariantViolation => ErrorKind::Internal,
            ErrorClass::Unresolved => ErrorKind::Unresolved,
            ErrorClass::Unsupported => ErrorKind::Unsupported,
        };

        Self::new(kind, origin, err.to_string())
    }
}

///
/// ErrorKind
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    /// Configuration could not be parsed.
    Config,

    /// A closure or operation has no query-language equivalent.
    Unsupported,

    /// A field, entity or argument could not be resolved.
    Unresolved,

    /// The caller cannot remediate this.
    Internal,
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Config,
    Fold,
    Render,
    Translate,
}
