//! Error types.
//!
//! Two distinct failure worlds, kept deliberately separate:
//!
//! - [`Error`] is infrastructure: binding a port, accepting a connection.
//!   It surfaces from [`Server::serve`](crate::Server::serve) and nowhere else.
//! - [`Failure`] is the application-level signal a middleware step or handler
//!   raises to divert a single request into the error pipeline. It never
//!   crosses a request boundary and never takes the process down.

use std::fmt;

/// The error type returned by troilo's fallible infrastructure operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values or as [`Failure`] signals, not as
/// `Error`s.
#[derive(Debug)]
pub struct Error(std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "io: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

/// A failure signaled by a middleware step or a route handler.
///
/// Returning `Err(Failure::...)` from a step diverts the request out of the
/// normal chain and into the error pipeline (see
/// [`App::on_error`](crate::App::on_error)). Error steps receive the failure
/// value and may respond, pass it along, or re-signal a different one.
///
/// `NotFound` and `MethodNotAllowed` conditions are produced at the router
/// boundary and rendered directly as 404/405 responses; they do not travel
/// through this type.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The request declared a structured body that could not be decoded.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// The request body exceeded the parser's size cap.
    #[error("request body of {0} bytes exceeds the parse limit")]
    BodyTooLarge(usize),

    /// A route handler raised an unexpected failure.
    #[error("handler error: {0}")]
    Handler(String),
}

impl Failure {
    /// Wraps any error value as a handler failure.
    ///
    /// Convenient at the end of a `map_err` in handler code:
    ///
    /// ```rust,ignore
    /// let bytes = serde_json::to_vec(&todos).map_err(Failure::handler)?;
    /// ```
    pub fn handler(err: impl fmt::Display) -> Self {
        Self::Handler(err.to_string())
    }
}
