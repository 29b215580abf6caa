//! Simulated reader field and tag
//!
//! [`SimulatedField`] stands in for the radio: tests and the CLI present a
//! [`SimulatedTag`] to it, and [`UltralightTransport`](crate::UltralightTransport)
//! talks to that tag through the same frame level link a reader would use.

mod field;
mod tag;

pub use field::{SimulatedField, SimulatedLink};
pub use tag::SimulatedTag;

use crate::{commands::TagModel, constants::UID_LENGTH, crypto::AesKey};

/// Parameters for building a [`SimulatedTag`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Product model reported by GET_VERSION
    pub model: TagModel,
    /// Real UID
    pub uid: [u8; UID_LENGTH],
    /// Present a random ID during anticollision
    pub random_id: bool,
    /// Data protection key programmed into slot 0
    pub key0: AesKey,
    /// UID retrieval key programmed into slot 1
    pub key1: AesKey,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            model: TagModel::UltralightAes,
            uid: [0x04, 0xA2, 0x3B, 0x1C, 0x5D, 0x6E, 0x80],
            random_id: false,
            key0: [0u8; 16],
            key1: [0u8; 16],
        }
    }
}

impl SimulationConfig {
    /// Set the product model
    pub const fn with_model(mut self, model: TagModel) -> Self {
        self.model = model;
        self
    }

    /// Set the UID
    pub const fn with_uid(mut self, uid: [u8; UID_LENGTH]) -> Self {
        self.uid = uid;
        self
    }

    /// Enable or disable random ID
    pub const fn with_random_id(mut self, random_id: bool) -> Self {
        self.random_id = random_id;
        self
    }

    /// Set both tag keys
    pub const fn with_keys(mut self, key0: AesKey, key1: AesKey) -> Self {
        self.key0 = key0;
        self.key1 = key1;
        self
    }

    /// Build the tag
    pub fn build(&self) -> SimulatedTag {
        SimulatedTag::from_config(self)
    }
}
