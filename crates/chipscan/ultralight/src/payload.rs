//! Payload area format
//!
//! The payload area starts with a two byte header: a format marker and the
//! body length. A plain body is stored as is. A sealed body is
//! `IV || AES-CBC(data) || MAC`, with both keys diversified from the data
//! protection key and the tag UID, so a sealed payload copied to another tag
//! no longer verifies.

use bytes::Bytes;
use rand::{RngCore, rng};

use crate::{
    Error, Result,
    constants::{
        MAC_LENGTH,
        layout::{PAGE_SIZE, PAYLOAD_PAGES},
        payload_format,
    },
    crypto::{self, AesKey, BLOCK_SIZE, purpose},
};

/// Size of the payload area in bytes
pub const AREA_SIZE: usize = PAYLOAD_PAGES as usize * PAGE_SIZE;

/// Size of the format header
pub const HEADER_SIZE: usize = 2;

/// Largest body that fits the area
pub const PLAIN_CAPACITY: usize = AREA_SIZE - HEADER_SIZE;

/// Largest payload that can be sealed
///
/// The ciphertext is padded to whole blocks with at least one padding byte.
pub const SEALED_CAPACITY: usize =
    (PLAIN_CAPACITY - BLOCK_SIZE - MAC_LENGTH) / BLOCK_SIZE * BLOCK_SIZE - 1;

const MIN_SEALED_BODY: usize = BLOCK_SIZE + BLOCK_SIZE + MAC_LENGTH;

/// Decoded contents of the payload area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredPayload {
    /// Nothing was ever written
    Empty,
    /// Payload stored in the clear
    Plain(Bytes),
    /// Sealed body, still to be opened
    Sealed(Bytes),
}

/// Decode the raw payload area
pub fn decode_area(area: &[u8]) -> Result<StoredPayload> {
    let Some((&[format, length], rest)) = area.split_first_chunk::<HEADER_SIZE>() else {
        return Err(Error::InvalidResponse("payload area too short"));
    };
    let length = length as usize;
    if format == payload_format::EMPTY {
        return Ok(StoredPayload::Empty);
    }
    if length > rest.len() {
        return Err(Error::Integrity("payload length exceeds area"));
    }

    let body = Bytes::copy_from_slice(&rest[..length]);
    match format {
        payload_format::PLAIN => Ok(StoredPayload::Plain(body)),
        payload_format::SEALED => Ok(StoredPayload::Sealed(body)),
        _ => Err(Error::Integrity("unknown payload format")),
    }
}

/// Encode `data` for storage in the clear
pub fn encode_plain(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > PLAIN_CAPACITY {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            capacity: PLAIN_CAPACITY,
        });
    }
    Ok(with_header(payload_format::PLAIN, data))
}

/// Encrypt and MAC `data` for the tag with `uid`
pub fn seal(data_key: &AesKey, uid: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > SEALED_CAPACITY {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            capacity: SEALED_CAPACITY,
        });
    }

    let mut iv = [0u8; BLOCK_SIZE];
    rng().fill_bytes(&mut iv);

    let enc_key = crypto::diversify(data_key, purpose::PAYLOAD_ENC, uid);
    let ciphertext = crypto::encrypt_padded(&enc_key, &iv, data);

    let mut body = Vec::with_capacity(BLOCK_SIZE + ciphertext.len() + MAC_LENGTH);
    body.extend_from_slice(&iv);
    body.extend_from_slice(&ciphertext);
    let mac = body_mac(data_key, uid, &body);
    body.extend_from_slice(&mac);

    Ok(with_header(payload_format::SEALED, &body))
}

/// Verify and decrypt a sealed body read from the tag with `uid`
pub fn open(data_key: &AesKey, uid: &[u8], body: &[u8]) -> Result<Bytes> {
    if body.len() < MIN_SEALED_BODY || (body.len() - MAC_LENGTH) % BLOCK_SIZE != 0 {
        return Err(Error::Integrity("sealed payload has invalid length"));
    }

    let (authenticated, mac) = body.split_at(body.len() - MAC_LENGTH);
    if !crypto::mac_eq(&body_mac(data_key, uid, authenticated), mac) {
        return Err(Error::Integrity("payload MAC mismatch"));
    }

    let (iv, ciphertext) = authenticated.split_at(BLOCK_SIZE);
    let mut iv_block = [0u8; BLOCK_SIZE];
    iv_block.copy_from_slice(iv);

    let enc_key = crypto::diversify(data_key, purpose::PAYLOAD_ENC, uid);
    crypto::decrypt_padded(&enc_key, &iv_block, ciphertext).map(Bytes::from)
}

fn body_mac(data_key: &AesKey, uid: &[u8], body: &[u8]) -> crypto::Mac {
    let mac_key = crypto::diversify(data_key, purpose::PAYLOAD_MAC, uid);
    let mut input = Vec::with_capacity(uid.len() + body.len());
    input.extend_from_slice(uid);
    input.extend_from_slice(body);
    crypto::truncated_mac(&mac_key, &input)
}

fn with_header(format: u8, body: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(HEADER_SIZE + body.len());
    encoded.push(format);
    // Bodies never exceed PLAIN_CAPACITY, which fits a byte
    encoded.push(body.len() as u8);
    encoded.extend_from_slice(body);
    encoded
}
