//! Error types for the framecast library.

use std::fmt;

/// Errors that can occur in the framecast library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Protocol`](Self::Protocol) — malformed control messages
///   or replies. Fatal to the connection; the caller must tear down rather
///   than retry.
/// - **Transport**: [`Io`](Self::Io) — control-socket connect/read/write
///   failures. Fatal; the single-session design terminates rather than
///   recovers.
/// - **Frame store**: [`FileNotFound`](Self::FileNotFound) (the only source
///   of the 404 reply), [`CorruptFrame`](Self::CorruptFrame),
///   [`FrameTooLarge`](Self::FrameTooLarge).
/// - **Client**: [`Bind`](Self::Bind) — the data-channel port could not be
///   bound; the session cannot proceed to Playing.
///
/// Packet loss and reordering on the data channel are deliberately absent:
/// they are not errors and are handled by silent discard in the receiver.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error on the control channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested video file is missing or unreadable. Surfaced to the
    /// client as the literal `404` reply; the session stays in Init.
    #[error("video file not found: {0}")]
    FileNotFound(String),

    /// A control message or reply did not match the wire format.
    #[error("protocol violation: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// A frame record's length prefix was read but the payload (or the rest
    /// of the prefix) was not available. Fatal to the session, never retried.
    #[error("corrupt frame record: {0}")]
    CorruptFrame(String),

    /// Writer-side guard: the payload does not fit the 5-digit length field.
    #[error("frame payload of {len} bytes exceeds the {max}-byte record limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The client could not bind its data-channel listening port.
    #[error("failed to bind data port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Specific kind of control-protocol violation.
#[derive(Debug)]
pub enum ProtocolErrorKind {
    /// Input was empty.
    EmptyMessage,
    /// Wrong number of pipe-delimited fields for the message type.
    FieldCount,
    /// A numeric field (sequence, port, session id, status) did not parse.
    NonNumericField,
    /// Request code outside the {0, 1, 2, 3} set.
    UnknownRequestCode,
    /// Reply status outside the {200, 404, 500} set.
    UnknownStatus,
    /// A data-channel datagram shorter than the 12-byte fixed header.
    TruncatedPacket,
    /// Message bytes were not valid ASCII/UTF-8.
    InvalidEncoding,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::FieldCount => write!(f, "wrong field count"),
            Self::NonNumericField => write!(f, "non-numeric field"),
            Self::UnknownRequestCode => write!(f, "unknown request code"),
            Self::UnknownStatus => write!(f, "unknown reply status"),
            Self::TruncatedPacket => write!(f, "datagram shorter than the fixed header"),
            Self::InvalidEncoding => write!(f, "invalid message encoding"),
        }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
