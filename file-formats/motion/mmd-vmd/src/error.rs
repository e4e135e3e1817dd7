use thiserror::Error;

/// Error type for VMD operations
#[derive(Error, Debug)]
pub enum VmdError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the VMD signature
    #[error("invalid VMD signature: {found:?}")]
    InvalidSignature {
        /// What the signature field contained
        found: String,
    },

    /// A section declared more frames than the file holds
    #[error("truncated {section} section after {read} of {expected} frames")]
    TruncatedSection {
        /// Section name
        section: &'static str,
        /// Declared frame count
        expected: u32,
        /// Frames actually read
        read: u32,
    },

    /// Text cannot be represented in shift_jis
    #[error("cannot encode {0:?} as shift_jis")]
    Encoding(String),

    /// Encoded name exceeds its fixed-width field
    #[error("name {name:?} does not fit in {width} bytes")]
    NameTooLong {
        /// The offending name
        name: String,
        /// Field width in bytes
        width: usize,
    },
}

/// Result type for VMD operations
pub type Result<T> = std::result::Result<T, VmdError>;
