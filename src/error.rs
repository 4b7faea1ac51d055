//! Error types for the BattlEye RCON client

use thiserror::Error;

/// Result type for RCON operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection, the wire codec, and the CLI plumbing.
///
/// The variant set is stable: callers are expected to match on it to decide
/// between retrying (`Timeout`, `BufferFull`) and reopening the connection
/// (`ConnectionDown`, `ConnectionClosed`, `Io`).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on the UDP socket (fatal for the connection)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server refused the login password
    #[error("login failed")]
    LoginFailed,

    /// Server answered the login with an unexpected packet kind
    #[error("expected login response, got something else")]
    NotResponse,

    /// The caller's deadline elapsed before a reply arrived
    #[error("deadline timeout reached")]
    Timeout,

    /// All 256 sequence ids stayed busy for the whole deadline
    #[error("send queue is full, try again later")]
    BufferFull,

    /// Command body exceeds the protocol limit of
    /// [`MAX_COMMAND_BODY`](crate::packet::MAX_COMMAND_BODY) bytes
    #[error("command too long")]
    CommandTooLong,

    /// Configured buffer cannot hold the packet
    #[error("size of buffer is greater than the allowed")]
    BadSize,

    /// Inbound datagram shorter than the minimum packet size
    #[error("packet size too small")]
    PacketTooSmall,

    /// Inbound datagram with wrong magic bytes or header terminator
    #[error("packet header mismatched")]
    BadHeader,

    /// Inbound datagram failed the CRC check
    #[error("CRC mismatch")]
    BadCrc,

    /// Inbound datagram with an unknown packet kind byte
    #[error("received unknown packet type")]
    UnknownKind,

    /// Multipart reply pages arrived out of order
    #[error("unexpected page number in multipart response")]
    BadSequence,

    /// The connection was closed while the operation was pending
    #[error("connection closed")]
    ConnectionClosed,

    /// The connection is not serving requests; the caller must reopen
    #[error("connection to server is down, reconnect required")]
    ConnectionDown,
}

impl Error {
    /// Whether this error is a malformed-datagram error the reader drops
    /// without touching connection state.
    pub fn is_malformed_packet(&self) -> bool {
        matches!(
            self,
            Error::PacketTooSmall | Error::BadHeader | Error::BadCrc | Error::UnknownKind
        )
    }

    /// Whether the caller may retry the same `send` on a live connection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout | Error::BufferFull | Error::BadSequence)
    }

    /// Whether the connection is gone and must be reopened by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::ConnectionDown
        )
    }
}
