//! Error type for key material handling
//!
//! Scan outcomes are not errors of this kind: they are reported through
//! [`ScanFailure`](crate::ScanFailure). This type covers the inbound path,
//! where secrets issued by the backend are decoded before they reach the
//! key store.

/// Result type for key material operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding or installing tag keys
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The key is not valid hexadecimal
    #[error("Invalid key encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The key does not have the expected length
    #[error("Invalid key length: expected {expected} hex digits, got {actual}")]
    InvalidKeyLength {
        /// Expected number of hex digits
        expected: usize,
        /// Actual number of hex digits
        actual: usize,
    },

    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Wrap this error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Return the innermost error, skipping any context layers
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait for attaching context to key material results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
