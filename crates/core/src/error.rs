//! Error types for query execution.
//!
//! Every failure in the system is an [`Error`]. Driver failures arrive already
//! classified by the connection layer into an [`ErrorKind`], which is what the
//! executor's retry loop branches on.
//!
//! # Categories
//!
//! | Category | Variants | Retried |
//! |----------|----------|---------|
//! | Transient | `Driver { kind: Transient }`, `ConnectionClosed` | yes, up to the policy bound |
//! | Terminal | `Driver { kind: Terminal }`, `InvalidInput`, `Config`, `Io` | never |
//! | Exhaustion | `Exhausted` | never (it *is* the final outcome) |

use thiserror::Error;

/// Result type alias for resql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a failure can be resolved by trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity or operational failure: dropped link, timeout, server busy.
    Transient,
    /// Caller or logic failure: bad syntax, unknown table, constraint violation.
    Terminal,
}

impl ErrorKind {
    /// Lower-case label used in log fields and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by configuration, connections and the executor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A failure reported by the database driver or server
    #[error("{kind} driver error{}: {message}", code_suffix(.code))]
    Driver {
        /// Retry classification assigned by the connection layer
        kind: ErrorKind,
        /// Server or client error code, when the driver reports one
        code: Option<u16>,
        /// Human-readable message from the driver
        message: String,
    },

    /// The connection handle is closed
    #[error("connection closed")]
    ConnectionClosed,

    /// Every allowed attempt failed with a transient error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// The failure observed on the final attempt
        #[source]
        last: Box<Error>,
    },

    /// The caller supplied something the executor cannot run
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// Configuration could not be parsed or failed validation
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },

    /// Reading or writing a local file failed
    #[error("I/O error: {reason}")]
    Io {
        /// What was wrong
        reason: String,
    },
}

fn code_suffix(code: &Option<u16>) -> String {
    code.map(|c| format!(" {}", c)).unwrap_or_default()
}

impl Error {
    /// Build a transient driver error without an error code
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Driver {
            kind: ErrorKind::Transient,
            code: None,
            message: message.into(),
        }
    }

    /// Build a terminal driver error without an error code
    pub fn terminal(message: impl Into<String>) -> Self {
        Error::Driver {
            kind: ErrorKind::Terminal,
            code: None,
            message: message.into(),
        }
    }

    /// Build a driver error carrying a server/client error code
    pub fn driver(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        Error::Driver {
            kind,
            code: Some(code),
            message: message.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Build a `Config` error
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// Retry classification of this error.
    ///
    /// `Exhausted` is terminal: the retry budget is already spent.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Driver { kind, .. } => *kind,
            Error::ConnectionClosed => ErrorKind::Transient,
            Error::Exhausted { .. }
            | Error::InvalidInput { .. }
            | Error::Config { .. }
            | Error::Io { .. } => ErrorKind::Terminal,
        }
    }

    /// True if retrying may resolve this error
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Driver error code, looking through `Exhausted` to the last cause
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Driver { code, .. } => *code,
            Error::Exhausted { last, .. } => last.code(),
            _ => None,
        }
    }

    /// The underlying cause for `Exhausted`, or the error itself otherwise
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            reason: e.to_string(),
        }
    }
}
