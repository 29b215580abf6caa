//! GET_VERSION command and tag model identification

use std::fmt;

use crate::{
    Error, Result,
    constants::{cmd, version},
};

/// GET_VERSION command
#[derive(Debug, Clone, Copy, Default)]
pub struct GetVersionCommand;

impl GetVersionCommand {
    /// Build the command frame
    pub fn to_frame(&self) -> Vec<u8> {
        vec![cmd::GET_VERSION]
    }

    /// Parse the eight byte version answer
    pub fn parse_response(&self, response: &[u8]) -> Result<VersionInfo> {
        let bytes: [u8; version::LENGTH] = response
            .try_into()
            .map_err(|_| Error::InvalidResponse("GET_VERSION answer has wrong length"))?;

        Ok(VersionInfo {
            header: bytes[0],
            vendor: bytes[1],
            product_type: bytes[2],
            subtype: bytes[3],
            major: bytes[4],
            minor: bytes[5],
            storage_size: bytes[6],
            protocol: bytes[7],
        })
    }
}

/// Tag product as reported by GET_VERSION
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagModel {
    /// MIFARE Ultralight AES
    UltralightAes,
    /// MIFARE Ultralight EV1
    UltralightEv1,
    /// NTAG 215
    Ntag215,
}

impl TagModel {
    /// Version bytes this model reports
    pub const fn version_bytes(&self) -> [u8; version::LENGTH] {
        match self {
            Self::UltralightAes => [0x00, 0x04, 0x03, 0x01, 0x04, 0x00, 0x0F, 0x03],
            Self::UltralightEv1 => [0x00, 0x04, 0x03, 0x01, 0x01, 0x00, 0x0B, 0x03],
            Self::Ntag215 => [0x00, 0x04, 0x04, 0x02, 0x01, 0x00, 0x11, 0x03],
        }
    }
}

impl fmt::Display for TagModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UltralightAes => "MIFARE Ultralight AES",
            Self::UltralightEv1 => "MIFARE Ultralight EV1",
            Self::Ntag215 => "NTAG215",
        })
    }
}

/// Decoded GET_VERSION answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Fixed header
    pub header: u8,
    /// Vendor ID
    pub vendor: u8,
    /// Product type
    pub product_type: u8,
    /// Product subtype
    pub subtype: u8,
    /// Major product version
    pub major: u8,
    /// Minor product version
    pub minor: u8,
    /// Storage size code
    pub storage_size: u8,
    /// Protocol type
    pub protocol: u8,
}

impl VersionInfo {
    /// Whether this is an Ultralight AES tag
    pub const fn is_ultralight_aes(&self) -> bool {
        self.vendor == version::VENDOR_NXP
            && self.product_type == version::TYPE_ULTRALIGHT
            && self.major == version::MAJOR_AES
    }

    /// Fail with [`Error::Incompatible`] unless this is an Ultralight AES tag
    pub fn ensure_supported(&self) -> Result<()> {
        if self.is_ultralight_aes() {
            Ok(())
        } else {
            Err(Error::Incompatible(self.to_string()))
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.vendor, self.product_type, self.major) {
            (version::VENDOR_NXP, version::TYPE_ULTRALIGHT, version::MAJOR_AES) => {
                "MIFARE Ultralight AES"
            }
            (version::VENDOR_NXP, version::TYPE_ULTRALIGHT, version::MAJOR_EV1) => {
                "MIFARE Ultralight EV1"
            }
            (version::VENDOR_NXP, version::TYPE_NTAG, _) => "NTAG",
            _ => "unknown tag",
        };
        write!(
            f,
            "{name} (vendor {:#04x}, type {:#04x}, version {}.{})",
            self.vendor, self.product_type, self.major, self.minor
        )
    }
}
