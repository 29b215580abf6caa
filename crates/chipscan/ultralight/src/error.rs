use chipscan_core::{ScanFailure, TransportError};
use thiserror::Error;

/// Result type for Ultralight operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Ultralight operations
#[derive(Debug, Error)]
pub enum Error {
    /// Link level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The tag answered with a negative acknowledge
    #[error("Tag returned NAK {0:#03X}")]
    Nak(u8),

    /// The tag is not an Ultralight AES tag
    #[error("Unsupported tag: {0}")]
    Incompatible(String),

    /// Mutual authentication did not complete
    #[error("Authentication failed: {0}")]
    Authentication(&'static str),

    /// A MAC or payload check failed
    #[error("Integrity check failed: {0}")]
    Integrity(&'static str),

    /// The response does not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),

    /// A page range runs past the last addressable page
    #[error("Range of {pages} pages from page {start:#04X} exceeds the address space")]
    PageRange {
        /// First page of the range
        start: u8,
        /// Number of pages requested
        pages: u8,
    },

    /// The payload does not fit the payload area
    #[error("Payload of {size} bytes exceeds capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Maximum payload size for the chosen format
        capacity: usize,
    },
}

impl From<Error> for ScanFailure {
    fn from(error: Error) -> Self {
        match error {
            Error::Transport(e) => Self::CommError(e),
            Error::Nak(code) => Self::CommError(TransportError::Nak(code)),
            Error::Incompatible(reason) => Self::Incompatible(reason),
            Error::Authentication(_) => Self::AuthFailed,
            Error::Integrity(_) => Self::IntegrityFailed,
            Error::InvalidResponse(reason) => Self::CommError(TransportError::Protocol(reason)),
            Error::PageRange { .. } => {
                Self::CommError(TransportError::Protocol("page range exceeds address space"))
            }
            Error::PayloadTooLarge { size, capacity } => {
                Self::CommError(TransportError::PayloadTooLarge { size, capacity })
            }
        }
    }
}
