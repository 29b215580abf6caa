//! Constants for the Ultralight AES native command set and memory layout

/// Native command codes
pub mod cmd {
    /// GET_VERSION
    pub const GET_VERSION: u8 = 0x60;
    /// READ, returns four pages
    pub const READ: u8 = 0x30;
    /// WRITE, writes one page
    pub const WRITE: u8 = 0xA2;
    /// AUTHENTICATE, first part
    pub const AUTHENTICATE: u8 = 0x1A;
    /// AUTHENTICATE, continuation frame and tag challenge prefix
    pub const AUTHENTICATE_PART2: u8 = 0xAF;
    /// Prefix of the final authentication answer
    pub const AUTHENTICATE_DONE: u8 = 0x00;
}

/// Acknowledge and negative acknowledge codes
pub mod ack {
    /// Acknowledge
    pub const ACK: u8 = 0x0A;
    /// Invalid argument, e.g. an address out of range
    pub const NAK_INVALID_ARGUMENT: u8 = 0x00;
    /// Parity or CRC error
    pub const NAK_CRC: u8 = 0x01;
    /// Authentication failed or access denied
    pub const NAK_AUTH: u8 = 0x04;
    /// EEPROM write error
    pub const NAK_WRITE: u8 = 0x05;
}

/// Key slots on the tag
pub mod key_no {
    /// Data protection key (key0)
    pub const DATA_PROTECTION: u8 = 0x00;
    /// UID retrieval key (key1)
    pub const UID_RETRIEVAL: u8 = 0x01;
}

/// Page layout
pub mod layout {
    /// Bytes per page
    pub const PAGE_SIZE: usize = 4;
    /// Pages returned by one READ
    pub const PAGES_PER_READ: u8 = 4;
    /// Bytes returned by one READ
    pub const READ_SIZE: usize = PAGE_SIZE * PAGES_PER_READ as usize;
    /// First page holding the UID
    pub const UID_PAGE: u8 = 0x00;
    /// First writable page
    pub const FIRST_USER_PAGE: u8 = 0x04;
    /// First page of the payload area
    pub const PAYLOAD_START: u8 = 0x04;
    /// Pages in the payload area
    pub const PAYLOAD_PAGES: u8 = 32;
    /// First page of the diagnostic scratch area
    pub const SCRATCH_START: u8 = 0x24;
    /// Pages in the diagnostic scratch area
    pub const SCRATCH_PAGES: u8 = 4;
    /// Last addressable page
    pub const LAST_PAGE: u8 = 0x27;
    /// Total addressable pages
    pub const TOTAL_PAGES: usize = LAST_PAGE as usize + 1;
}

/// GET_VERSION response fields
pub mod version {
    /// Length of the GET_VERSION response
    pub const LENGTH: usize = 8;
    /// NXP vendor ID
    pub const VENDOR_NXP: u8 = 0x04;
    /// Product type MIFARE Ultralight
    pub const TYPE_ULTRALIGHT: u8 = 0x03;
    /// Product type NTAG
    pub const TYPE_NTAG: u8 = 0x04;
    /// Major product version of the AES variant
    pub const MAJOR_AES: u8 = 0x04;
    /// Major product version of EV1 / NTAG21x
    pub const MAJOR_EV1: u8 = 0x01;
}

/// Payload area format markers
pub mod payload_format {
    /// No payload stored
    pub const EMPTY: u8 = 0x00;
    /// Payload stored in the clear
    pub const PLAIN: u8 = 0x01;
    /// Payload encrypted and MACed with the data protection key
    pub const SEALED: u8 = 0x02;
}

/// Length of a UID read from the UID pages
pub const UID_LENGTH: usize = 7;

/// Length of a truncated MAC
pub const MAC_LENGTH: usize = 8;

/// Cascade tag folded into the first UID check byte
pub const CASCADE_TAG: u8 = 0x88;

/// First byte of a random ID presented during anticollision
pub const RANDOM_ID_PREFIX: u8 = 0x08;
