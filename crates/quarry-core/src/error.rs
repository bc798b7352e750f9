use crate::closure::{ArgRef, ClosureId};
use std::fmt;
use thiserror::Error as ThisError;

///
/// TranslateError
///
/// Local translation failure for one closure. Never fatal to the host:
/// callers are expected to fall back to another execution strategy.
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum TranslateError {
    #[error("{closure}: cannot resolve {arg}: {message}")]
    ArgumentResolution {
        closure: ClosureId,
        arg: ArgRef,
        message: String,
    },

    #[error("{closure}: irreducible control flow at instruction {pc}: {message}")]
    IrreducibleControlFlow {
        closure: ClosureId,
        pc: usize,
        message: String,
    },

    #[error("{closure}: no queryable field behind '{entity}.{accessor}'")]
    UnresolvedField {
        closure: ClosureId,
        entity: String,
        accessor: String,
    },

    #[error("{closure}: unsupported construct at instruction {pc}: {message}")]
    UnsupportedConstruct {
        closure: ClosureId,
        pc: usize,
        message: String,
    },
}

impl TranslateError {
    /// Identity of the closure whose translation failed.
    #[must_use]
    pub const fn closure(&self) -> ClosureId {
        match self {
            Self::ArgumentResolution { closure, .. }
            | Self::IrreducibleControlFlow { closure, .. }
            | Self::UnresolvedField { closure, .. }
            | Self::UnsupportedConstruct { closure, .. } => *closure,
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ArgumentResolution { .. } | Self::UnresolvedField { .. } => {
                ErrorClass::Unresolved
            }
            Self::IrreducibleControlFlow { .. } | Self::UnsupportedConstruct { .. } => {
                ErrorClass::Unsupported
            }
        }
    }
}

///
/// QueryError
/// Errors surfaced by the translator façade: fold, render and configuration.
///

#[remain::sorted]
#[derive(Debug, ThisError)]
pub enum QueryError {
    #[error("invalid translator configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("cannot render query: {0}")]
    Render(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("entity '{0}' is not queryable")]
    UnknownEntity(String),

    #[error("{operation} is not supported here: {reason}")]
    UnsupportedOperation {
        operation: &'static str,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn unsupported(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) => ErrorClass::Config,
            Self::Render(_) => ErrorClass::InvariantViolation,
            Self::Translate(err) => err.class(),
            Self::UnknownEntity(_) => ErrorClass::Unresolved,
            Self::UnsupportedOperation { .. } => ErrorClass::Unsupported,
        }
    }
}

///
/// ErrorClass
/// Stable classification used by callers to pick a fallback.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Config,
    InvariantViolation,
    Unresolved,
    Unsupported,
}

impl ErrorClass {
    /// Whether evaluating the stream in memory could still answer the query.
    #[must_use]
    pub const fn is_fallback_candidate(self) -> bool {
        matches!(self, Self::Unresolved | Self::Unsupported)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Config => "config",
            Self::InvariantViolation => "invariant_violation",
            Self::Unresolved => "unresolved",
            Self::Unsupported => "unsupported",
        };

        f.write_str(label)
    }
}
