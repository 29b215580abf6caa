//! Tag key material
//!
//! A tag is addressed with two independent AES-128 keys. Key slot 0 protects
//! the payload data, key slot 1 unlocks retrieval of the tag's real UID.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result, ResultExt};

/// Length of a tag key in bytes
pub const KEY_LENGTH: usize = 16;

/// A single AES-128 tag key
///
/// The key bytes are wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TagKey([u8; KEY_LENGTH]);

impl TagKey {
    /// Create a key from raw bytes
    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its hex representation
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if encoded.len() != KEY_LENGTH * 2 {
            return Err(Error::InvalidKeyLength {
                expected: KEY_LENGTH * 2,
                actual: encoded.len(),
            });
        }

        let mut bytes = [0u8; KEY_LENGTH];
        hex::decode_to_slice(encoded, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    pub const fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TagKey(..)")
    }
}

/// Secret pair as issued by the backend
///
/// Both keys are hex encoded. `key0` is the data protection key and `key1` the
/// UID retrieval key, matching the key slots on the tag.
#[derive(Clone, Deserialize, Serialize)]
pub struct TagSecret {
    /// Data protection key, hex encoded
    pub key0: String,
    /// UID retrieval key, hex encoded
    pub key1: String,
}

impl TagSecret {
    /// Create a secret pair from its hex encoded halves
    pub fn new(key0: impl Into<String>, key1: impl Into<String>) -> Self {
        Self {
            key0: key0.into(),
            key1: key1.into(),
        }
    }
}

impl fmt::Debug for TagSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagSecret")
            .field("key0", &"..")
            .field("key1", &"..")
            .finish()
    }
}

/// The pair of keys used to talk to a tag
///
/// Either key may be absent. Operations that need a missing key must refuse
/// to run rather than fall back to a default.
#[derive(Debug, Clone, Default)]
pub struct TagKeys {
    uid_retrieval: Option<TagKey>,
    data_protection: Option<TagKey>,
}

impl TagKeys {
    /// A pair with neither key set
    pub const fn empty() -> Self {
        Self {
            uid_retrieval: None,
            data_protection: None,
        }
    }

    /// Create a pair from its two halves
    pub const fn new(uid_retrieval: Option<TagKey>, data_protection: Option<TagKey>) -> Self {
        Self {
            uid_retrieval,
            data_protection,
        }
    }

    /// Decode both halves of a backend secret
    ///
    /// Fails if either half cannot be decoded; no partial pair is returned.
    pub fn from_secret(secret: &TagSecret) -> Result<Self> {
        let data_protection = TagKey::from_hex(&secret.key0).context("key0")?;
        let uid_retrieval = TagKey::from_hex(&secret.key1).context("key1")?;

        Ok(Self::new(Some(uid_retrieval), Some(data_protection)))
    }

    /// The UID retrieval key (tag key slot 1)
    pub const fn uid_retrieval(&self) -> Option<&TagKey> {
        self.uid_retrieval.as_ref()
    }

    /// The data protection key (tag key slot 0)
    pub const fn data_protection(&self) -> Option<&TagKey> {
        self.data_protection.as_ref()
    }

    /// Whether neither key is set
    pub const fn is_empty(&self) -> bool {
        self.uid_retrieval.is_none() && self.data_protection.is_none()
    }
}
