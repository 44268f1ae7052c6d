//! Push engine error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
use std::result;

/// A convenience wrapper around `Result` for `imap_push::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur while driving an IMAP push session.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to the
    /// underlying connection. Recoverable: the push loop closes the folder
    /// and retries with backoff.
    Io(IoError),
    /// A malformed or unexpected response from the server. Recovered the
    /// same way as [`Error::Io`].
    Protocol(String),
    /// The server does not advertise the `IDLE` capability. Fatal for this
    /// folder's pusher.
    IdleUnsupported(String),
    /// The server rejected our credentials while (re)opening the folder.
    /// Fatal for this folder's pusher.
    AuthenticationFailed(String),
    /// The public API was misused (double start, double stop, or a session
    /// operation after the connection was detached). Always surfaced to the
    /// caller, never routed through the retry ladder.
    BadState(&'static str),
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => fmt::Display::fmt(e, f),
            Error::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Error::IdleUnsupported(msg) => fmt::Display::fmt(msg, f),
            Error::AuthenticationFailed(msg) => {
                write!(f, "authentication failed: {}", msg)
            }
            Error::BadState(msg) => write!(f, "bad state: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}
