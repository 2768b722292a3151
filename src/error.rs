//! Error types for the IRC client core.
//!
//! [`ClientError`] covers connection-lifetime failures and is what
//! [`Client::run`](crate::Client::run) returns. [`MessageParseError`] covers
//! the message grammar, and [`TrackerError`] the non-fatal state-tracker
//! failures that the client logs and discards.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error on an incoming line.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// The byte stream reached EOF.
    #[error("connection closed")]
    ConnectionClosed,

    /// Failed to parse an incoming IRC message.
    ///
    /// Inside the read loop this is fatal: a garbled server stream is
    /// unrecoverable.
    #[error("invalid message: {string}")]
    InvalidMessage {
        /// The raw line that failed to parse.
        string: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// No PONG arrived for an outstanding PING within the deadline.
    #[error("ping timeout")]
    PingTimeout,

    /// The server NAKed a capability that was requested as required.
    #[error("required capability rejected by server: {0}")]
    CapRejected(String),

    /// Negotiation finished without the server ACKing a required capability.
    #[error("required capability not accepted: {0}")]
    CapNotAccepted(String),

    /// A write was attempted while the client is winding down.
    #[error("client is shutting down")]
    ShuttingDown,

    /// `run` was called while another `run` already owns the read loop.
    #[error("client is already running")]
    AlreadyRunning,

    /// A reply helper could not determine where to send the reply.
    #[error("message has no reply target")]
    MissingReplyTarget,
}

/// Errors encountered when parsing IRC messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Input was empty after trimming whitespace.
    #[error("empty message")]
    EmptyMessage,

    /// A tags section was present but nothing followed it.
    #[error("no data after tags")]
    MissingDataAfterTags,

    /// A prefix was present but nothing followed it.
    #[error("no data after prefix")]
    MissingDataAfterPrefix,

    /// No command token remained after tags and prefix.
    #[error("missing command")]
    MissingCommand,
}

/// Non-fatal errors from the ISUPPORT and membership trackers.
///
/// The client logs these and keeps running; they are returned so direct
/// callers of the tracker handles can inspect them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackerError {
    /// A channel-scoped message arrived for a channel the tracker has not
    /// seen the client join.
    #[error("message for unknown channel: {0}")]
    UnknownChannel(String),

    /// A tracked command was missing required parameters.
    #[error("malformed {0} message")]
    MalformedMessage(&'static str),

    /// An RPL_ISUPPORT message was missing required parameters.
    #[error("malformed RPL_ISUPPORT message")]
    MalformedIsupport,

    /// The ISUPPORT PREFIX value could not be parsed into a symbol map.
    #[error("invalid ISUPPORT PREFIX format")]
    InvalidPrefixFormat,
}
