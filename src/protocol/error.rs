//! Defines the error type shared by the wire-protocol primitives.

use thiserror::Error;

/// A failure decoding or framing a message on the stdio wire protocol.
///
/// Every variant here is fatal to whatever session observes it: once the
/// wire desyncs there is no way to resume parsing at the next line boundary
/// with confidence.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// An I/O error occurred reading or writing a pipe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A hex-encoded audio frame had the wrong length or a non-hex byte.
    #[error("malformed hex frame: {0}")]
    MalformedHexFrame(String),
    /// A text block begun by `speak` was never terminated by a `.` line
    /// before the peer closed the connection.
    #[error("unterminated text block at end of input")]
    UnterminatedTextBlock,
    /// A text block grew past the 64 KiB hard cap.
    #[error("text block exceeds the maximum size")]
    TextBlockOverflow,
}
