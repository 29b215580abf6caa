//! MIFARE Ultralight AES transport for the chipscan engine
//!
//! This crate implements [`chipscan_core::TagTransport`] for Ultralight AES
//! tags: the three pass AES mutual authentication, CMAC secure messaging,
//! and a payload area format that seals data under keys diversified from the
//! data protection key and the tag UID.
//!
//! The radio is abstracted behind [`TagField`] and [`TagLink`]. The [`sim`]
//! module provides a simulated field and tag that speak the same native
//! frames, which the tests and the CLI use in place of reader hardware.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod channel;
pub mod commands;
pub mod constants;
pub mod crypto;
pub mod link;
pub mod payload;
pub mod sim;
pub mod transport;

mod error;
mod session;

pub use channel::TagChannel;
pub use commands::{TagModel, VersionInfo};
pub use error::{Error, Result};
pub use link::{TagField, TagLink};
pub use sim::{SimulatedField, SimulatedLink, SimulatedTag, SimulationConfig};
pub use transport::UltralightTransport;

/// Transport over the simulated field
pub type SimulatedTransport = UltralightTransport<SimulatedField>;
