//! Error types for wire decoding

use thiserror::Error;

/// Result alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding wire formats.
///
/// Encoding never fails: every in-memory value has a valid encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Input ended before a complete structure was read
    #[error("input truncated: expected at least {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required to continue
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Varint longer than five bytes or larger than `u32::MAX`
    #[error("malformed varint")]
    InvalidVarint,

    /// Leading version byte is not one this implementation reads
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// A required field was absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A fixed-size field had the wrong length
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidFieldLength {
        /// Field name
        field: &'static str,
        /// Required length
        expected: usize,
        /// Length found on the wire
        actual: usize,
    },

    /// Tag with a wire type that cannot be skipped
    #[error("unknown wire type in tag {0:#04x}")]
    UnknownWireType(u8),
}
