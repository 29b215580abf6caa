//! Key store and scan engine for authenticated NFC tag transactions
//!
//! This crate holds the security relevant core that sits between a physical tag
//! transport and the application code consuming scan results.
//!
//! ## Overview
//!
//! - [`KeyStore`] owns the two symmetric tag keys (UID retrieval key and data
//!   protection key) and replaces them only as a whole pair.
//! - [`TagScanner`] drives one Read, Write or Test transaction per call. It
//!   refuses to touch the transport when a mandatory key is missing and passes
//!   every other outcome through unchanged.
//! - [`TagTransport`] is the seam to the hardware (or a simulation of it).
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod config;
pub mod key_store;
pub mod keys;
pub mod request;
pub mod result;
pub mod scanner;
pub mod transport;

mod error;
pub use error::{Error, Result, ResultExt};

pub use config::ScannerConfig;
pub use key_store::KeyStore;
pub use keys::{KEY_LENGTH, TagKey, TagKeys, TagSecret};
pub use request::{ReadMode, ScanKind, ScanRequest};
pub use result::{Protection, ScanFailure, ScanResult, ScannedTag, TagPayload, TagUid};
pub use scanner::TagScanner;
pub use transport::{TagTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Bytes, KeyStore, Protection, ReadMode, ScanFailure, ScanRequest, ScanResult, ScannedTag,
        TagKey, TagKeys, TagPayload, TagScanner, TagSecret, TagTransport, TagUid,
        TransportError,
    };
}
