use thiserror::Error;

/// Error type for PMX operations
#[derive(Error, Debug)]
pub enum PmxError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the PMX magic
    #[error("invalid PMX magic: {found:?}")]
    InvalidMagic {
        /// The four bytes found instead
        found: [u8; 4],
    },

    /// Only versions 2.0 and 2.1 are supported
    #[error("unsupported PMX version {version}")]
    UnsupportedVersion {
        /// Version field from the header
        version: f32,
    },

    /// Header globals are malformed
    #[error("invalid header: {reason}")]
    InvalidHeader {
        /// What was wrong
        reason: String,
    },

    /// An index-size global is not 1, 2 or 4
    #[error("invalid {field} index size {size}")]
    InvalidIndexSize {
        /// Which index table
        field: &'static str,
        /// Size byte from the header
        size: u8,
    },

    /// Text could not be decoded with the declared encoding
    #[error("cannot decode {context} string")]
    Encoding {
        /// Which string failed
        context: &'static str,
    },

    /// An enum byte has no defined meaning
    #[error("invalid {field} value {value}")]
    InvalidEnum {
        /// Field name
        field: &'static str,
        /// The byte found
        value: u8,
    },
}

/// Result type for PMX operations
pub type Result<T> = std::result::Result<T, PmxError>;
