//! Error kinds surfaced by graph construction and execution.
//!
//! Every failure terminates the stream it occurred in: the consumer observes
//! the error at the next pull and the stream yields nothing afterwards. Rows
//! produced before the failure stay delivered.

use std::io;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All failure modes of a pipeline, from composition through execution.
#[derive(Debug, Error)]
pub enum Error {
    /// The graph referenced a source binding that does not exist at `run`.
    #[error("graph construction: {0}")]
    Construction(String),

    /// A required column was absent from a row.
    #[error("column {column:?} is missing from a row")]
    Schema { column: String },

    /// A reduce or join input was not non-decreasing on its key-tuple.
    #[error("{context} input is not sorted on {keys:?}")]
    Order {
        context: &'static str,
        keys: Vec<String>,
    },

    /// The file source's line parser rejected a line.
    #[error("parser failed on line {line}: {cause}")]
    Parser { line: usize, cause: anyhow::Error },

    /// Filesystem failure reading input or reading/writing spill segments.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A mapper, reducer, or joiner failed.
    #[error("user function failed: {0}")]
    User(anyhow::Error),
}

/// Discriminant of [`Error`], for matching in callers and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Construction,
    Schema,
    Order,
    Parser,
    Io,
    User,
}

impl Error {
    /// Wrap a failure raised by a user-supplied mapper, reducer, or joiner.
    pub fn user(source: impl Into<anyhow::Error>) -> Self {
        Error::User(source.into())
    }

    pub(crate) fn missing_column(column: impl Into<String>) -> Self {
        Error::Schema {
            column: column.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Construction(_) => ErrorKind::Construction,
            Error::Schema { .. } => ErrorKind::Schema,
            Error::Order { .. } => ErrorKind::Order,
            Error::Parser { .. } => ErrorKind::Parser,
            Error::Io(_) => ErrorKind::Io,
            Error::User(_) => ErrorKind::User,
        }
    }
}
