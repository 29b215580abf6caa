//! AUTHENTICATE command (0x1A) and its 0xAF continuation

use crate::{
    Error, Result,
    constants::{ack::NAK_AUTH, cmd},
    crypto::BLOCK_SIZE,
};

use super::nak_code;

/// Two part AES AUTHENTICATE exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticateCommand {
    /// Key slot on the tag
    pub key_no: u8,
}

impl AuthenticateCommand {
    /// Authenticate against key slot `key_no`
    pub const fn new(key_no: u8) -> Self {
        Self { key_no }
    }

    /// First frame, asks the tag for its encrypted challenge
    pub fn to_frame(&self) -> Vec<u8> {
        vec![cmd::AUTHENTICATE, self.key_no]
    }

    /// Second frame carrying `E(K, RndA || RndB')`
    pub fn continuation_frame(token: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(1 + token.len());
        frame.push(cmd::AUTHENTICATE_PART2);
        frame.extend_from_slice(token);
        frame
    }

    /// Extract `E(K, RndB)` from the first answer
    pub fn parse_challenge(&self, response: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
        parse_block(response, cmd::AUTHENTICATE_PART2, "key slot rejected")
    }

    /// Extract `E(K, RndA')` from the final answer
    pub fn parse_final(&self, response: &[u8]) -> Result<[u8; BLOCK_SIZE]> {
        parse_block(response, cmd::AUTHENTICATE_DONE, "host cryptogram rejected")
    }
}

fn parse_block(response: &[u8], prefix: u8, rejected: &'static str) -> Result<[u8; BLOCK_SIZE]> {
    match nak_code(response) {
        Some(NAK_AUTH) => return Err(Error::Authentication(rejected)),
        Some(code) => return Err(Error::Nak(code)),
        None => {}
    }

    match response.split_first() {
        Some((p, block)) if *p == prefix => block
            .try_into()
            .map_err(|_| Error::InvalidResponse("authentication block has wrong length")),
        _ => Err(Error::InvalidResponse("unexpected authentication prefix")),
    }
}
