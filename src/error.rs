//! Error and Result types for the TStorage wire-protocol engine.

use std::io;

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy surfaced by [`crate::channel::Channel`] and the
/// components it composes.
///
/// Any variant other than a caller-side [`Error::Invalid`] closes the
/// channel: after it is returned, the channel must be reconnected via
/// `close()` then `connect()` before further use.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested operation is not legal in the channel's current state
    /// (e.g. `connect` while open, `close` while closed, a request issued
    /// against a closed channel).
    #[error("invalid operation: {0}")]
    Invalid(&'static str),

    /// The bytes required for this operation exceed the configured memory
    /// limit. The caller may raise the limit and retry on a fresh channel.
    #[error("required bytes exceed the configured memory limit")]
    LimitExceeded,

    /// Host allocation failed while growing an internal buffer.
    #[error("buffer allocation failed")]
    ResourceExhaustion,

    /// The underlying byte stream returned fewer bytes than required, or
    /// reported an error, while reading.
    #[error("error receiving from the underlying stream: {0}")]
    Receive(#[source] io::Error),

    /// The underlying byte stream reported an error while writing.
    #[error("error sending to the underlying stream: {0}")]
    Send(#[source] io::Error),

    /// The server sent a malformed or inconsistent frame.
    #[error("unexpected protocol data: {0}")]
    Unexpected(String),

    /// The payload codec failed to decode a record's body.
    #[error("payload decode failed: {0}")]
    Decode(String),

    /// The server returned a non-zero `result` in a response header. The
    /// code is the server-defined status, passed through verbatim.
    #[error("server returned status {0}")]
    ServerStatus(i32),
}

impl Error {
    /// True if this error leaves the channel usable (the caller's request
    /// was simply malformed and nothing was written to the wire).
    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::Invalid(_))
    }
}
