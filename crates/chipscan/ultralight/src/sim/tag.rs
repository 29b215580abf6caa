//! Tag side of the Ultralight AES protocol

use std::fmt;

use bytes::Bytes;
use rand::{Rng, RngCore, rng};
use tracing::trace;

use crate::{
    commands::TagModel,
    constants::{
        CASCADE_TAG, RANDOM_ID_PREFIX, UID_LENGTH,
        ack::{ACK, NAK_AUTH, NAK_INVALID_ARGUMENT},
        cmd, key_no,
        layout::{FIRST_USER_PAGE, LAST_PAGE, PAGE_SIZE, PAGES_PER_READ, TOTAL_PAGES},
    },
    crypto::{self, AesKey, BLOCK_SIZE},
    session::Session,
};

use super::SimulationConfig;

/// Authentication state of the simulated tag
#[derive(Debug)]
enum AuthState {
    Idle,
    Challenged { key_no: u8, rnd_b: [u8; BLOCK_SIZE] },
    Authenticated(Session),
}

/// Simulated Ultralight tag answering native command frames
pub struct SimulatedTag {
    model: TagModel,
    uid: [u8; UID_LENGTH],
    random_id: bool,
    keys: [AesKey; 2],
    memory: [[u8; PAGE_SIZE]; TOTAL_PAGES],
    state: AuthState,
    forge_response_macs: bool,
    frames_left: Option<usize>,
}

impl fmt::Debug for SimulatedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedTag")
            .field("model", &self.model)
            .field("uid", &hex::encode_upper(self.uid))
            .field("random_id", &self.random_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SimulatedTag {
    /// Ultralight AES tag with factory keys (all zero) and empty memory
    pub fn new(uid: [u8; UID_LENGTH]) -> Self {
        let mut memory = [[0u8; PAGE_SIZE]; TOTAL_PAGES];
        memory[0] = [uid[0], uid[1], uid[2], CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2]];
        memory[1] = [uid[3], uid[4], uid[5], uid[6]];
        memory[2] = [uid[3] ^ uid[4] ^ uid[5] ^ uid[6], 0x48, 0x00, 0x00];

        Self {
            model: TagModel::UltralightAes,
            uid,
            random_id: false,
            keys: [[0u8; 16]; 2],
            memory,
            state: AuthState::Idle,
            forge_response_macs: false,
            frames_left: None,
        }
    }

    /// Build a tag from a simulation config
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.uid)
            .with_model(config.model)
            .with_keys(config.key0, config.key1)
            .with_random_id(config.random_id)
    }

    /// Report a different product in GET_VERSION
    pub const fn with_model(mut self, model: TagModel) -> Self {
        self.model = model;
        self
    }

    /// Program the data protection key (key 0) and UID retrieval key (key 1)
    pub const fn with_keys(mut self, key0: AesKey, key1: AesKey) -> Self {
        self.keys = [key0, key1];
        self
    }

    /// Present a random ID during anticollision and hide the UID pages until
    /// the host authenticates with key 1
    pub const fn with_random_id(mut self, enabled: bool) -> Self {
        self.random_id = enabled;
        self
    }

    /// Append wrong MACs to secure messaging answers
    pub const fn with_forged_response_macs(mut self) -> Self {
        self.forge_response_macs = true;
        self
    }

    /// Leave the field after answering `frames` frames
    pub const fn with_departure_after(mut self, frames: usize) -> Self {
        self.frames_left = Some(frames);
        self
    }

    /// Product model
    pub const fn model(&self) -> TagModel {
        self.model
    }

    /// Real seven byte UID
    pub const fn uid(&self) -> &[u8; UID_LENGTH] {
        &self.uid
    }

    /// Contents of one page, `None` when out of range
    pub fn page(&self, page: u8) -> Option<[u8; PAGE_SIZE]> {
        self.memory.get(page as usize).copied()
    }

    /// Contents of `pages` consecutive pages starting at `start`
    pub fn pages(&self, start: u8, pages: u8) -> Vec<u8> {
        (start..start.saturating_add(pages))
            .filter_map(|page| self.page(page))
            .flatten()
            .collect()
    }

    /// Overwrite a page directly, bypassing access checks
    pub fn set_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) {
        if let Some(slot) = self.memory.get_mut(page as usize) {
            *slot = data;
        }
    }

    /// Whether the tag has left the field
    pub const fn has_departed(&self) -> bool {
        matches!(self.frames_left, Some(0))
    }

    /// Reset to the idle state and return the anticollision UID
    pub fn activate(&mut self) -> Bytes {
        self.state = AuthState::Idle;
        if self.random_id {
            let mut id = [RANDOM_ID_PREFIX, 0, 0, 0];
            rng().fill(&mut id[1..]);
            Bytes::copy_from_slice(&id)
        } else {
            Bytes::copy_from_slice(&self.uid)
        }
    }

    /// Answer one native command frame
    pub fn process(&mut self, frame: &[u8]) -> Vec<u8> {
        if let Some(left) = self.frames_left.as_mut() {
            *left = left.saturating_sub(1);
        }

        let response = match std::mem::replace(&mut self.state, AuthState::Idle) {
            AuthState::Challenged { key_no, rnd_b } => self.finish_authentication(key_no, &rnd_b, frame),
            _ if frame.first() == Some(&cmd::AUTHENTICATE) => self.start_authentication(frame),
            AuthState::Authenticated(session) => self.process_secure(session, frame),
            AuthState::Idle => self.execute(frame, None),
        };
        trace!(
            frame = %hex::encode(frame),
            response = %hex::encode(&response),
            "Simulated tag answered"
        );
        response
    }

    fn start_authentication(&mut self, frame: &[u8]) -> Vec<u8> {
        let [_, key_no] = frame else {
            return vec![NAK_INVALID_ARGUMENT];
        };
        if self.model != TagModel::UltralightAes || *key_no > key_no::UID_RETRIEVAL {
            return vec![NAK_INVALID_ARGUMENT];
        }

        let mut rnd_b = [0u8; BLOCK_SIZE];
        rng().fill_bytes(&mut rnd_b);
        let key = &self.keys[*key_no as usize];

        let mut response = vec![cmd::AUTHENTICATE_PART2];
        response.extend_from_slice(&crypto::encrypt_blocks(key, &rnd_b));
        self.state = AuthState::Challenged {
            key_no: *key_no,
            rnd_b,
        };
        response
    }

    fn finish_authentication(&mut self, key_no: u8, rnd_b: &[u8; BLOCK_SIZE], frame: &[u8]) -> Vec<u8> {
        let Some((&cmd::AUTHENTICATE_PART2, token)) = frame.split_first() else {
            return vec![NAK_AUTH];
        };
        if token.len() != 2 * BLOCK_SIZE {
            return vec![NAK_AUTH];
        }

        let key = self.keys[key_no as usize];
        let plain = crypto::decrypt_blocks(&key, token);
        let (rnd_a, rotated_rnd_b) = plain.split_at(BLOCK_SIZE);
        if !crypto::mac_eq(rotated_rnd_b, &crypto::rotate_left(rnd_b)) {
            return vec![NAK_AUTH];
        }

        let mut rnd_a_block = [0u8; BLOCK_SIZE];
        rnd_a_block.copy_from_slice(rnd_a);

        let mut response = vec![cmd::AUTHENTICATE_DONE];
        response.extend_from_slice(&crypto::encrypt_blocks(
            &key,
            &crypto::rotate_left(&rnd_a_block),
        ));
        self.state =
            AuthState::Authenticated(Session::establish(&key, key_no, &rnd_a_block, rnd_b));
        response
    }

    fn process_secure(&mut self, mut session: Session, frame: &[u8]) -> Vec<u8> {
        let Some(command) = session.check_command(frame) else {
            return vec![NAK_AUTH];
        };

        let data = self.execute(command, Some(session.key_no()));
        if is_nak(&data) {
            return data;
        }
        if session.advance().is_err() {
            return vec![NAK_AUTH];
        }

        let mut mac = session.response_mac(&data);
        if self.forge_response_macs {
            mac[0] ^= 0xFF;
        }
        let mut response = data;
        response.extend_from_slice(&mac);
        self.state = AuthState::Authenticated(session);
        response
    }

    fn execute(&mut self, frame: &[u8], session_key: Option<u8>) -> Vec<u8> {
        match frame {
            [cmd::GET_VERSION] => self.model.version_bytes().to_vec(),
            [cmd::READ, page] if *page <= LAST_PAGE => self.read(*page, session_key),
            [cmd::WRITE, page, data @ ..] if data.len() == PAGE_SIZE => {
                self.write(*page, data, session_key)
            }
            _ => vec![NAK_INVALID_ARGUMENT],
        }
    }

    fn read(&self, start: u8, session_key: Option<u8>) -> Vec<u8> {
        let hide_uid = self.random_id && session_key != Some(key_no::UID_RETRIEVAL);
        (0..PAGES_PER_READ as usize)
            .map(|offset| (start as usize + offset) % TOTAL_PAGES)
            .flat_map(|page| {
                if hide_uid && page < 3 {
                    [0u8; PAGE_SIZE]
                } else {
                    self.memory[page]
                }
            })
            .collect()
    }

    fn write(&mut self, page: u8, data: &[u8], session_key: Option<u8>) -> Vec<u8> {
        if !(FIRST_USER_PAGE..=LAST_PAGE).contains(&page) {
            return vec![NAK_INVALID_ARGUMENT];
        }
        if session_key.is_none() {
            return vec![NAK_AUTH];
        }
        self.memory[page as usize].copy_from_slice(data);
        vec![ACK]
    }
}

fn is_nak(response: &[u8]) -> bool {
    matches!(response, [code] if *code != ACK)
}
