//! Scan requests handed to a transport

use bytes::Bytes;
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::TagKey;

/// How much verification a read performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadMode {
    /// Identity from anticollision only, no authentication and no payload
    Fast,
    /// Read UID and payload
    Full {
        /// Authenticate with the UID retrieval key and read the real UID
        auth: bool,
        /// Require and verify a MAC on every tag response
        cmac: bool,
    },
}

impl ReadMode {
    /// Full read with authentication and response MACs
    pub const fn secure() -> Self {
        Self::Full {
            auth: true,
            cmac: true,
        }
    }

    /// Whether an authenticated session is needed
    ///
    /// Response MACs are computed with session keys, so `cmac` implies
    /// authentication.
    pub const fn needs_session(&self) -> bool {
        match self {
            Self::Fast => false,
            Self::Full { auth, cmac } => *auth || *cmac,
        }
    }

    /// Whether response MACs are verified
    pub const fn verifies_cmac(&self) -> bool {
        matches!(self, Self::Full { cmac: true, .. })
    }
}

impl Default for ReadMode {
    fn default() -> Self {
        Self::secure()
    }
}

/// Operation kind, used for logging and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ScanKind {
    /// Read UID and payload
    #[display("read")]
    Read,
    /// Write payload
    #[display("write")]
    Write,
    /// Diagnostic round trip
    #[display("test")]
    Test,
}

/// One transaction against a tag, together with the keys it needs
#[derive(Debug, Clone)]
pub enum ScanRequest {
    /// Read the tag UID and payload
    Read {
        /// Verification level
        mode: ReadMode,
        /// Key for authentication and UID retrieval
        uid_retrieval_key: TagKey,
        /// Key for payload verification; without it the payload is returned
        /// unverified
        data_protection_key: Option<TagKey>,
    },
    /// Write a payload to the tag
    Write {
        /// Payload to store
        payload: Bytes,
        /// Key for authentication and UID retrieval
        uid_retrieval_key: TagKey,
        /// Key for payload protection; without it the payload is stored in
        /// the clear
        data_protection_key: Option<TagKey>,
    },
    /// Check that the tag and both keys work together
    Test {
        /// Key for authentication and UID retrieval
        uid_retrieval_key: TagKey,
        /// Key for payload protection
        data_protection_key: TagKey,
    },
}

impl ScanRequest {
    /// The kind of operation
    pub const fn kind(&self) -> ScanKind {
        match self {
            Self::Read { .. } => ScanKind::Read,
            Self::Write { .. } => ScanKind::Write,
            Self::Test { .. } => ScanKind::Test,
        }
    }

    /// The UID retrieval key, which every request carries
    pub const fn uid_retrieval_key(&self) -> &TagKey {
        match self {
            Self::Read {
                uid_retrieval_key, ..
            }
            | Self::Write {
                uid_retrieval_key, ..
            }
            | Self::Test {
                uid_retrieval_key, ..
            } => uid_retrieval_key,
        }
    }

    /// The data protection key, if the request carries one
    pub const fn data_protection_key(&self) -> Option<&TagKey> {
        match self {
            Self::Read {
                data_protection_key,
                ..
            }
            | Self::Write {
                data_protection_key,
                ..
            } => data_protection_key.as_ref(),
            Self::Test {
                data_protection_key,
                ..
            } => Some(data_protection_key),
        }
    }
}
