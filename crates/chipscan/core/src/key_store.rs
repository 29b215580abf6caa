//! Holder of the current tag key pair
//!
//! The store is created once per session and shared through an [`Arc`]. The
//! pair is swapped behind a lock as a single pointer, so readers observe
//! either the previous pair or the new one in full.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{Result, TagKeys, TagSecret};

/// Single source of truth for the tag keys
#[derive(Debug, Default)]
pub struct KeyStore {
    current: RwLock<Arc<TagKeys>>,
}

impl KeyStore {
    /// Create a store with no keys set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-provisioned with a key pair
    pub fn with_keys(keys: TagKeys) -> Self {
        Self {
            current: RwLock::new(Arc::new(keys)),
        }
    }

    /// Replace the whole key pair
    pub fn set_keys(&self, keys: TagKeys) {
        debug!(
            uid_retrieval = keys.uid_retrieval().is_some(),
            data_protection = keys.data_protection().is_some(),
            "Replacing tag keys"
        );
        *self.current.write() = Arc::new(keys);
    }

    /// Decode a backend secret pair and install it
    ///
    /// Decoding happens before the store is touched: on error the previous
    /// pair stays in place.
    pub fn set_tag_secret(&self, secret: &TagSecret) -> Result<()> {
        let keys = TagKeys::from_secret(secret)?;
        self.set_keys(keys);
        Ok(())
    }

    /// Snapshot of the latest key pair
    pub fn current_keys(&self) -> Arc<TagKeys> {
        Arc::clone(&self.current.read())
    }

    /// Forget both keys
    pub fn clear(&self) {
        self.set_keys(TagKeys::empty());
    }
}
