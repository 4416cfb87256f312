use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;

/// Classifies why a tool call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments did not fit the tool.
    InvalidInput,
    /// The tool ran and failed.
    ExecutionError,
    /// No tool with the requested name is registered.
    NotFound,
}

impl ErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::ExecutionError => "Execution error",
            ErrorKind::NotFound => "Not found",
        }
    }
}

impl Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool call, with an optional human-readable reason.
///
/// The reason ends up in front of the model, so it should say what went
/// wrong in plain words:
///
/// ```
/// use archer_core::tool::{Error, ErrorKind};
///
/// let err = Error::execution_error().with_reason("city is unknown");
/// assert_eq!(err.kind(), ErrorKind::ExecutionError);
/// assert_eq!(err.reason(), "city is unknown");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    const fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// An `InvalidInput` error without a reason.
    #[inline]
    pub const fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// An `ExecutionError` error without a reason.
    #[inline]
    pub const fn execution_error() -> Self {
        Self::new(ErrorKind::ExecutionError)
    }

    /// A `NotFound` error without a reason.
    #[inline]
    pub const fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Replaces the reason.
    #[inline]
    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason, or the kind's name when none was given.
    pub fn reason(&self) -> Cow<'_, str> {
        match &self.reason {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Borrowed(self.kind.as_str()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => Display::fmt(&self.kind, f),
        }
    }
}

impl StdError for Error {}

impl From<serde_json::Error> for Error {
    /// Arguments that fail to decode are the caller's fault.
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_input().with_reason(err.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::execution_error().with_reason(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_falls_back_to_kind() {
        let err = Error::execution_error();
        assert_eq!(err.reason(), "Execution error");
        assert_eq!(err.to_string(), "Execution error");

        let err = Error::not_found().with_reason("Tool 'x' not found.");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.reason(), "Tool 'x' not found.");
        assert_eq!(err.to_string(), "Not found: Tool 'x' not found.");
    }

    #[test]
    fn test_conversions() {
        let decode_err = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        assert_eq!(Error::from(decode_err).kind(), ErrorKind::InvalidInput);

        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_err);
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.reason(), "gone");
    }
}
