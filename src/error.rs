//! Error types for framewire.

use thiserror::Error;

/// Main error type for all framewire operations.
#[derive(Debug, Error)]
pub enum FramewireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's connection preface did not match the expected constant.
    ///
    /// The peer is assumed not to speak this protocol at all; the
    /// connection is torn down without a response.
    #[error("invalid connection preface")]
    InvalidPreface,

    /// The peer closed the connection in the middle of a 9-byte frame header.
    #[error("connection closed mid frame header")]
    TruncatedHeader,

    /// The peer closed the connection before delivering the payload bytes
    /// its frame header promised.
    #[error("connection closed mid frame payload")]
    TruncatedPayload,

    /// A frame header claimed a payload larger than the configured maximum.
    #[error("frame payload of {length} bytes exceeds maximum {max}")]
    FrameTooLarge { length: u32, max: u32 },

    /// A request was issued on a stream id that already has an exchange
    /// in flight.
    #[error("stream id {0} already has an exchange in flight")]
    DuplicateStream(u32),

    /// TLS configuration or handshake error.
    #[error("TLS error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// Protocol violation (bad stream id, malformed transport input, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("backpressure timeout")]
    Backpressure,
}

/// Result type alias using FramewireError.
pub type Result<T> = std::result::Result<T, FramewireError>;
