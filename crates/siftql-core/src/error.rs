use std::fmt;
use thiserror::Error as ThisError;

///
/// QueryError
///
/// Every failure the compiler or a compiled predicate can report.
/// Compile-time variants abort `transpile`; `Runtime` is raised per record.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("incorrect quotation")]
    Quotation,

    #[error("incorrect ordering condition")]
    Ordering,

    #[error("syntax error inside query: {0}")]
    Syntax(String),

    #[error("runtime error during filtering: {0}")]
    Runtime(String),

    #[error("empty query")]
    EmptyQuery,
}

impl QueryError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Quotation => ErrorKind::Quotation,
            Self::Ordering => ErrorKind::Ordering,
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::EmptyQuery => ErrorKind::EmptyQuery,
        }
    }

    /// True for failures raised while compiling, as opposed to evaluating.
    #[must_use]
    pub const fn is_compile_time(&self) -> bool {
        !matches!(self, Self::Runtime(_))
    }
}

///
/// ErrorKind
///
/// Stable classification of a `QueryError`, independent of its message.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    Quotation,
    Ordering,
    Syntax,
    Runtime,
    EmptyQuery,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Quotation => "Quotation",
            Self::Ordering => "Ordering",
            Self::Syntax => "Syntax",
            Self::Runtime => "Runtime",
            Self::EmptyQuery => "EmptyQuery",
        };

        f.write_str(label)
    }
}

///
/// FunctionError
///
/// Failure reported by an injected function; surfaces as `QueryError::Runtime`.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct FunctionError {
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
