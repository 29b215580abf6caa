//! Scan outcomes

use std::fmt;

use bytes::Bytes;
use derive_more::Deref;

use crate::TransportError;

/// Result of one scan transaction
pub type ScanResult = std::result::Result<ScannedTag, ScanFailure>;

/// Unique identifier of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref)]
pub struct TagUid(Bytes);

impl TagUid {
    /// Create a UID from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// The UID as an integer, most significant byte first
    ///
    /// Returns `None` for UIDs longer than eight bytes.
    pub fn to_u64(&self) -> Option<u64> {
        if self.0.len() > 8 {
            return None;
        }
        Some(self.0.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Whether a payload's integrity was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// Decrypted and MAC verified with the data protection key
    Verified,
    /// Returned as stored, no verification performed
    Unprotected,
}

/// Payload read from a tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPayload {
    /// Payload bytes
    pub data: Bytes,
    /// Verification applied to `data`
    pub protection: Protection,
}

impl TagPayload {
    /// A payload that passed verification
    pub fn verified(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            protection: Protection::Verified,
        }
    }

    /// A payload returned without verification
    pub fn unprotected(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            protection: Protection::Unprotected,
        }
    }

    /// Whether the payload can be trusted
    pub const fn is_verified(&self) -> bool {
        matches!(self.protection, Protection::Verified)
    }
}

/// A successfully scanned tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedTag {
    /// Tag UID
    pub uid: TagUid,
    /// Payload, if the operation reads one and the tag holds one
    pub payload: Option<TagPayload>,
}

impl ScannedTag {
    /// Create a scan outcome
    pub const fn new(uid: TagUid, payload: Option<TagPayload>) -> Self {
        Self { uid, payload }
    }
}

/// Classified reason a scan did not succeed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanFailure {
    /// A key the operation requires is not set; the tag was not contacted
    #[error("No key available for this operation")]
    NoKey,

    /// The tag does not match the expected type or scheme
    #[error("Incompatible tag: {0}")]
    Incompatible(String),

    /// The cryptographic handshake was rejected
    #[error("Tag authentication failed")]
    AuthFailed,

    /// A MAC or payload verification did not match
    #[error("Tag data integrity check failed")]
    IntegrityFailed,

    /// Transport or hardware failure
    #[error("Communication error: {0}")]
    CommError(#[from] TransportError),
}

impl ScanFailure {
    /// Whether the failure was raised before any I/O took place
    pub const fn is_no_key(&self) -> bool {
        matches!(self, Self::NoKey)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_uid_display_and_value() {
        let uid = TagUid::new(hex!("04a1b2c3d4e580").to_vec());
        assert_eq!(uid.to_string(), "04A1B2C3D4E580");
        assert_eq!(uid.to_u64(), Some(0x04A1_B2C3_D4E5_80));
        assert_eq!(uid.len(), 7);

        let long = TagUid::new(vec![0u8; 10]);
        assert_eq!(long.to_u64(), None);
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            ScanFailure::NoKey.to_string(),
            "No key available for this operation"
        );
        assert_eq!(
            ScanFailure::from(TransportError::TagRemoved).to_string(),
            "Communication error: Tag left the field"
        );
        assert!(ScanFailure::NoKey.is_no_key());
        assert!(!ScanFailure::AuthFailed.is_no_key());
    }

    #[test]
    fn test_payload_protection() {
        assert!(TagPayload::verified(Bytes::from_static(b"x")).is_verified());
        assert!(!TagPayload::unprotected(Bytes::from_static(b"x")).is_verified());
    }
}
