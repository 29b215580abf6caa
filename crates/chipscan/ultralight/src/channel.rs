//! Command channel on top of a [`TagLink`]
//!
//! The channel runs the authentication handshake and, once a session is
//! established, wraps every command in secure messaging. It also offers the
//! page level helpers the transactions are built from.

use bytes::Bytes;
use chipscan_core::TagKey;
use rand::{RngCore, rng};
use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    commands::{
        AuthenticateCommand, GetVersionCommand, ReadCommand, VersionInfo, WriteCommand, nak_code,
        nak_error,
    },
    constants::{
        CASCADE_TAG, UID_LENGTH,
        layout::{PAGE_SIZE, PAGES_PER_READ, READ_SIZE, UID_PAGE},
    },
    crypto::{self, BLOCK_SIZE},
    link::TagLink,
    session::Session,
};

/// Command channel to an activated Ultralight AES tag
#[derive(Debug)]
pub struct TagChannel<L> {
    link: L,
    session: Option<Session>,
    verify_responses: bool,
}

impl<L: TagLink> TagChannel<L> {
    /// Wrap an activated link; no session is established yet
    pub const fn new(link: L) -> Self {
        Self {
            link,
            session: None,
            verify_responses: false,
        }
    }

    /// Whether an authenticated session is active
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Key slot of the active session
    pub fn session_key_no(&self) -> Option<u8> {
        self.session.as_ref().map(Session::key_no)
    }

    /// The underlying link
    pub const fn link(&self) -> &L {
        &self.link
    }

    /// UID reported during anticollision
    pub fn anticollision_uid(&self) -> Bytes {
        self.link.anticollision_uid()
    }

    /// Run mutual AES authentication against `key_no`
    ///
    /// With `verify_responses` every answer in the new session must carry a
    /// valid MAC; otherwise answer MACs are stripped unchecked. Any previous
    /// session is discarded first.
    pub fn authenticate(&mut self, key_no: u8, key: &TagKey, verify_responses: bool) -> Result<()> {
        self.session = None;
        let key = key.as_bytes();
        let command = AuthenticateCommand::new(key_no);
        debug!(key_no, "Authenticating with tag");

        let response = self.link.transceive(&command.to_frame())?;
        let encrypted_rnd_b = command.parse_challenge(&response)?;
        let rnd_b = to_block(&crypto::decrypt_blocks(key, &encrypted_rnd_b));

        let mut rnd_a = [0u8; BLOCK_SIZE];
        rng().fill_bytes(&mut rnd_a);

        let mut token = Vec::with_capacity(2 * BLOCK_SIZE);
        token.extend_from_slice(&rnd_a);
        token.extend_from_slice(&crypto::rotate_left(&rnd_b));
        let token = crypto::encrypt_blocks(key, &token);

        let response = self
            .link
            .transceive(&AuthenticateCommand::continuation_frame(&token))?;
        let encrypted_rnd_a = command.parse_final(&response)?;
        let rotated_rnd_a = crypto::decrypt_blocks(key, &encrypted_rnd_a);

        if !crypto::mac_eq(&rotated_rnd_a, &crypto::rotate_left(&rnd_a)) {
            warn!(key_no, "Tag answered authentication with wrong cryptogram");
            return Err(Error::Authentication("tag cryptogram mismatch"));
        }

        self.session = Some(Session::establish(key, key_no, &rnd_a, &rnd_b));
        self.verify_responses = verify_responses;
        debug!(key_no, verify_responses, "Authenticated session established");
        Ok(())
    }

    /// Send a command frame, applying secure messaging when a session is
    /// active, and return the answer data
    ///
    /// A NAK ends the session on both sides.
    pub fn transceive(&mut self, frame: &[u8]) -> Result<Bytes> {
        let outgoing = match &self.session {
            Some(session) => session.protect(frame),
            None => frame.to_vec(),
        };

        let response = self.link.transceive(&outgoing)?;
        if let Some(code) = nak_code(&response) {
            if self.session.take().is_some() {
                debug!(code, "NAK ended authenticated session");
            }
            return Err(nak_error(code));
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(response);
        };
        session.advance()?;
        let data = session.open_response(&response, self.verify_responses)?;
        trace!(counter = session.counter(), "Secure messaging answer accepted");
        Ok(response.slice_ref(data))
    }

    /// Query the product version
    pub fn get_version(&mut self) -> Result<VersionInfo> {
        let command = GetVersionCommand;
        let response = self.transceive(&command.to_frame())?;
        command.parse_response(&response)
    }

    /// Read the four pages starting at `page`
    pub fn read_pages(&mut self, page: u8) -> Result<[u8; READ_SIZE]> {
        let command = ReadCommand::new(page);
        let response = self.transceive(&command.to_frame())?;
        command.parse_response(&response)
    }

    /// Read `pages` pages starting at `start`
    pub fn read_range(&mut self, start: u8, pages: u8) -> Result<Vec<u8>> {
        if pages > 0 && start.checked_add(pages - 1).is_none() {
            return Err(Error::PageRange { start, pages });
        }

        let mut data = Vec::with_capacity(pages as usize * PAGE_SIZE);
        for offset in (0..pages).step_by(PAGES_PER_READ as usize) {
            data.extend_from_slice(&self.read_pages(start + offset)?);
        }
        data.truncate(pages as usize * PAGE_SIZE);
        Ok(data)
    }

    /// Write one page
    pub fn write_page(&mut self, page: u8, data: [u8; PAGE_SIZE]) -> Result<()> {
        let command = WriteCommand::new(page, data);
        let response = self.transceive(&command.to_frame())?;
        command.parse_response(&response)
    }

    /// Write `data` to consecutive pages starting at `start`, zero filling
    /// the last page
    pub fn write_range(&mut self, start: u8, data: &[u8]) -> Result<()> {
        for (page, contents) in split_pages(start, data)? {
            self.write_page(page, contents)?;
        }
        Ok(())
    }

    /// Write `data` like [`Self::write_range`], using the first page as a
    /// commit marker
    ///
    /// The first page is set to `invalid` before any other page is touched
    /// and receives its real contents last. An interrupted write leaves
    /// either the old contents or `invalid` in the first page, never the old
    /// first page over new data.
    pub fn write_range_committed(
        &mut self,
        start: u8,
        data: &[u8],
        invalid: [u8; PAGE_SIZE],
    ) -> Result<()> {
        let pages = split_pages(start, data)?;
        let Some(((first_page, first), rest)) = pages.split_first() else {
            return Ok(());
        };

        self.write_page(*first_page, invalid)?;
        for (page, contents) in rest {
            self.write_page(*page, *contents)?;
        }
        self.write_page(*first_page, *first)
    }

    /// Read the seven byte UID from the UID pages and check both BCC bytes
    pub fn read_uid(&mut self) -> Result<Bytes> {
        let pages = self.read_pages(UID_PAGE)?;
        let uid: Vec<u8> = pages[0..3].iter().chain(&pages[4..8]).copied().collect();
        debug_assert_eq!(uid.len(), UID_LENGTH);

        let bcc0 = CASCADE_TAG ^ pages[0] ^ pages[1] ^ pages[2];
        let bcc1 = pages[4] ^ pages[5] ^ pages[6] ^ pages[7];
        if pages[3] != bcc0 || pages[8] != bcc1 {
            return Err(Error::InvalidResponse("UID check bytes mismatch"));
        }
        Ok(Bytes::from(uid))
    }
}

fn to_block(data: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&data[..BLOCK_SIZE]);
    block
}

/// Split `data` into zero filled pages numbered from `start`
fn split_pages(start: u8, data: &[u8]) -> Result<Vec<(u8, [u8; PAGE_SIZE])>> {
    let too_large = || Error::PayloadTooLarge {
        size: data.len(),
        capacity: (usize::from(u8::MAX) + 1 - usize::from(start)) * PAGE_SIZE,
    };

    data.chunks(PAGE_SIZE)
        .enumerate()
        .map(|(offset, chunk)| {
            let page = u8::try_from(offset)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(too_large)?;
            let mut contents = [0u8; PAGE_SIZE];
            contents[..chunk.len()].copy_from_slice(chunk);
            Ok((page, contents))
        })
        .collect()
}
