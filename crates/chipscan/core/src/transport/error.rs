//! Error types specific to tag transport

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The tag left the field during the transaction
    #[error("Tag left the field")]
    TagRemoved,

    /// The tag answered with a negative acknowledge
    #[error("Tag returned NAK {0:#03X}")]
    Nak(u8),

    /// The tag answered with a frame that does not fit the protocol
    #[error("Protocol error: {0}")]
    Protocol(&'static str),

    /// The payload does not fit the tag
    #[error("Payload of {size} bytes exceeds tag capacity of {capacity} bytes")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Capacity available for the payload
        capacity: usize,
    },

    /// Listening was stopped before a tag was found
    #[error("Operation cancelled")]
    Cancelled,
}
