use std::fmt;

/// Transport-layer failures (`spec.md` §7, taxonomy: Transport).
#[derive(Debug)]
pub enum TransportError {
    /// A length-prefix or payload read stopped partway through — a
    /// protocol error, not a recoverable condition (`spec.md` §4.4).
    ShortRead,
    /// The declared payload length was outside `1..=FIP_MAX_PAYLOAD`.
    InvalidLength(usize),
    /// The underlying stream returned an I/O error on write.
    WriteFailed(std::io::Error),
    /// The underlying stream returned an I/O error on read.
    ReadFailed(std::io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead => write!(f, "short read: frame ended before it was fully read"),
            Self::InvalidLength(len) => write!(f, "invalid frame length: {len}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WriteFailed(e) | Self::ReadFailed(e) => Some(e),
            _ => None,
        }
    }
}
