//! Cryptographic operations for Ultralight AES
//!
//! AES-128 in CBC mode with a zero IV for the authentication exchange,
//! AES-CMAC (RFC 4493) for session key derivation and secure messaging, and
//! CBC with ISO 7816 padding for sealed payloads.

use aes::Aes128;
use cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Iso7816,
    generic_array::GenericArray,
};
use cmac::{Cmac, Mac as _};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{Error, Result, constants::MAC_LENGTH};

/// Raw AES-128 key
pub type AesKey = [u8; 16];
/// Truncated MAC as carried in frames and sealed payloads
pub type Mac = [u8; MAC_LENGTH];

type Block = aes::Block;
type Encryptor = cbc::Encryptor<Aes128>;
type Decryptor = cbc::Decryptor<Aes128>;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Session vector prefix for the encryption key
const SV1_PREFIX: [u8; 6] = [0xA5, 0x5A, 0x00, 0x01, 0x00, 0x80];
/// Session vector prefix for the MAC key
const SV2_PREFIX: [u8; 6] = [0x5A, 0xA5, 0x00, 0x01, 0x00, 0x80];

/// Diversification purposes for keys derived from the data protection key
pub(crate) mod purpose {
    pub(crate) const PAYLOAD_ENC: u8 = 0x01;
    pub(crate) const PAYLOAD_MAC: u8 = 0x02;
    pub(crate) const PROBE_MAC: u8 = 0x03;
}

/// Calculate the AES-CMAC of `data` as defined in RFC 4493
pub fn cmac(key: &AesKey, data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut mac = <Cmac<Aes128> as KeyInit>::new(GenericArray::from_slice(key));
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// CMAC truncated to eight bytes, keeping every second byte
pub fn truncated_mac(key: &AesKey, data: &[u8]) -> Mac {
    let full = cmac(key, data);
    let mut mac = Mac::default();
    for (dst, src) in mac.iter_mut().zip(full.iter().skip(1).step_by(2)) {
        *dst = *src;
    }
    mac
}

/// Encrypt whole blocks in CBC mode with a zero IV
pub(crate) fn encrypt_blocks(key: &AesKey, data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);
    let mut blocks: Vec<Block> = data
        .chunks_exact(BLOCK_SIZE)
        .map(Block::clone_from_slice)
        .collect();
    Encryptor::new(GenericArray::from_slice(key), &Default::default())
        .encrypt_blocks_mut(&mut blocks);
    blocks.iter().flat_map(|b| b.iter().copied()).collect()
}

/// Decrypt whole blocks in CBC mode with a zero IV
pub(crate) fn decrypt_blocks(key: &AesKey, data: &[u8]) -> Vec<u8> {
    debug_assert_eq!(data.len() % BLOCK_SIZE, 0);
    let mut blocks: Vec<Block> = data
        .chunks_exact(BLOCK_SIZE)
        .map(Block::clone_from_slice)
        .collect();
    Decryptor::new(GenericArray::from_slice(key), &Default::default())
        .decrypt_blocks_mut(&mut blocks);
    blocks.iter().flat_map(|b| b.iter().copied()).collect()
}

/// Encrypt data in CBC mode, padding it in ISO 7816 format
pub(crate) fn encrypt_padded(key: &AesKey, iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Vec<u8> {
    Encryptor::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .encrypt_padded_vec_mut::<Iso7816>(data)
}

/// Decrypt data in CBC mode and strip ISO 7816 padding
pub(crate) fn decrypt_padded(key: &AesKey, iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    Decryptor::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
        .decrypt_padded_vec_mut::<Iso7816>(data)
        .map_err(|_| Error::Integrity("invalid payload padding"))
}

/// Rotate a random number left by one byte
pub(crate) fn rotate_left(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut rotated = *block;
    rotated.rotate_left(1);
    rotated
}

/// Derive the session encryption and MAC keys after mutual authentication
///
/// SV = prefix || RndA[0..2] || (RndA[2..8] ^ RndB[0..6]) || RndB[6..16] || RndA[8..16]
pub(crate) fn derive_session_keys(
    key: &AesKey,
    rnd_a: &[u8; BLOCK_SIZE],
    rnd_b: &[u8; BLOCK_SIZE],
) -> (Zeroizing<AesKey>, Zeroizing<AesKey>) {
    let mut sv = Zeroizing::new([0u8; 32]);
    sv[6..8].copy_from_slice(&rnd_a[0..2]);
    for i in 0..6 {
        sv[8 + i] = rnd_a[2 + i] ^ rnd_b[i];
    }
    sv[14..24].copy_from_slice(&rnd_b[6..16]);
    sv[24..32].copy_from_slice(&rnd_a[8..16]);

    let mut sv1 = sv.clone();
    sv1[..6].copy_from_slice(&SV1_PREFIX);
    let mut sv2 = sv;
    sv2[..6].copy_from_slice(&SV2_PREFIX);

    (
        Zeroizing::new(cmac(key, &sv1[..])),
        Zeroizing::new(cmac(key, &sv2[..])),
    )
}

/// MAC appended to a command frame in an authenticated session
pub(crate) fn command_mac(mac_key: &AesKey, counter: u16, frame: &[u8]) -> Mac {
    let mut input = Vec::with_capacity(frame.len() + 2);
    match frame.split_first() {
        Some((ins, rest)) => {
            input.push(*ins);
            input.extend_from_slice(&counter.to_le_bytes());
            input.extend_from_slice(rest);
        }
        None => input.extend_from_slice(&counter.to_le_bytes()),
    }
    truncated_mac(mac_key, &input)
}

/// MAC appended to a response frame in an authenticated session
pub(crate) fn response_mac(mac_key: &AesKey, counter: u16, data: &[u8]) -> Mac {
    let mut input = Vec::with_capacity(data.len() + 2);
    input.extend_from_slice(&counter.to_le_bytes());
    input.extend_from_slice(data);
    truncated_mac(mac_key, &input)
}

/// Derive a per tag key from the data protection key
pub(crate) fn diversify(key: &AesKey, purpose: u8, uid: &[u8]) -> Zeroizing<AesKey> {
    let mut input = Vec::with_capacity(uid.len() + 1);
    input.push(purpose);
    input.extend_from_slice(uid);
    Zeroizing::new(cmac(key, &input))
}

/// Compare two MACs in constant time
pub(crate) fn mac_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const RFC4493_KEY: AesKey = hex!("2b7e151628aed2a6abf7158809cf4f3c");
    const RFC4493_MSG: [u8; 64] = hex!(
        "6bc1bee22e409f96e93d7e117393172a"
        "ae2d8a571e03ac9c9eb76fac45af8e51"
        "30c81c46a35ce411e5fbc1191a0a52ef"
        "f69f2445df4f9b17ad2b417be66c3710"
    );

    #[test]
    fn test_cmac_rfc4493() {
        assert_eq!(
            cmac(&RFC4493_KEY, &[]),
            hex!("bb1d6929e95937287fa37d129b756746")
        );
        assert_eq!(
            cmac(&RFC4493_KEY, &RFC4493_MSG[..16]),
            hex!("070a16b46b4d4144f79bdd9dd04a287c")
        );
        assert_eq!(
            cmac(&RFC4493_KEY, &RFC4493_MSG[..40]),
            hex!("dfa66747de9ae63030ca32611497c827")
        );
        assert_eq!(
            cmac(&RFC4493_KEY, &RFC4493_MSG),
            hex!("51f0bebf7e3b9d92fc49741779363cfe")
        );
    }

    #[test]
    fn test_truncated_mac_keeps_odd_bytes() {
        let mac = truncated_mac(&RFC4493_KEY, &[]);
        // bb1d6929e95937287fa37d129b756746
        assert_eq!(mac, hex!("1d295928a3127546"));
    }

    #[test]
    fn test_encrypt_blocks_fips197() {
        let key = hex!("000102030405060708090a0b0c0d0e0f");
        let ciphertext = encrypt_blocks(&key, &hex!("00112233445566778899aabbccddeeff"));
        assert_eq!(ciphertext, hex!("69c4e0d86a7b0430d8cdb78070b4c55a"));

        let plaintext = decrypt_blocks(&key, &ciphertext);
        assert_eq!(plaintext, hex!("00112233445566778899aabbccddeeff"));
    }

    #[test]
    fn test_padded_round_trip_and_bad_key() {
        let key = [0x42; 16];
        let iv = [0x24; 16];
        let ciphertext = encrypt_padded(&key, &iv, b"balance=1500");
        assert_eq!(ciphertext.len(), 16);
        assert_eq!(
            decrypt_padded(&key, &iv, &ciphertext).unwrap(),
            b"balance=1500"
        );

        // A wrong key almost never yields valid ISO 7816 padding, but it
        // must never yield the original plaintext
        let wrong = decrypt_padded(&[0x43; 16], &iv, &ciphertext);
        assert!(wrong.map_or(true, |p| p != b"balance=1500"));
    }

    #[test]
    fn test_rotate_left() {
        let block = hex!("000102030405060708090a0b0c0d0e0f");
        assert_eq!(rotate_left(&block), hex!("0102030405060708090a0b0c0d0e0f00"));
    }

    #[test]
    fn test_session_keys_depend_on_both_randoms() {
        let key = [0u8; 16];
        let rnd_a = [0xA0; 16];
        let rnd_b = [0xB0; 16];

        let (enc, mac) = derive_session_keys(&key, &rnd_a, &rnd_b);
        assert_ne!(*enc, *mac);
        let (enc_again, mac_again) = derive_session_keys(&key, &rnd_a, &rnd_b);
        assert_eq!((*enc, *mac), (*enc_again, *mac_again));
        assert_ne!(*enc, *derive_session_keys(&key, &[0xA1; 16], &rnd_b).0);
        assert_ne!(*mac, *derive_session_keys(&key, &rnd_a, &[0xB1; 16]).1);
    }

    #[test]
    fn test_command_and_response_mac_bind_counter() {
        let key = [7u8; 16];
        let frame = [0x30, 0x04];
        assert_ne!(command_mac(&key, 0, &frame), command_mac(&key, 1, &frame));
        assert_ne!(response_mac(&key, 1, &[0x0A]), response_mac(&key, 2, &[0x0A]));
    }

    #[test]
    fn test_mac_eq() {
        assert!(mac_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!mac_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!mac_eq(&[1, 2], &[1, 2, 3]));
        assert!(mac_eq(&[], &[]));
    }

    #[test]
    fn test_diversified_keys_differ_per_purpose_and_uid() {
        let uid = hex!("04a23b1c5d6e80");
        let enc = diversify(&RFC4493_KEY, purpose::PAYLOAD_ENC, &uid);
        let mac = diversify(&RFC4493_KEY, purpose::PAYLOAD_MAC, &uid);
        assert_ne!(*enc, *mac);
        assert_ne!(*enc, *diversify(&RFC4493_KEY, purpose::PAYLOAD_ENC, &[0x04; 7]));
        assert_eq!(*enc, cmac(&RFC4493_KEY, &hex!("0104a23b1c5d6e80")));
    }
}
