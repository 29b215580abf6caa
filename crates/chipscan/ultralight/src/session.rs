//! Authenticated session state
//!
//! A session exists after a successful AES AUTHENTICATE. Every later command
//! carries a truncated CMAC over the frame and the command counter; every
//! answer carries one over the data and the incremented counter.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    Error, Result,
    constants::MAC_LENGTH,
    crypto::{self, AesKey, Mac},
};

/// State of an authenticated session
#[derive(Clone)]
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Session {
    mac_key: AesKey,
    key_no: u8,
    counter: u16,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key_no", &self.key_no)
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session from both random numbers of the handshake
    pub(crate) fn establish(
        key: &AesKey,
        key_no: u8,
        rnd_a: &[u8; crypto::BLOCK_SIZE],
        rnd_b: &[u8; crypto::BLOCK_SIZE],
    ) -> Self {
        // Frames are MACed, not encrypted, so only the MAC key is kept
        let (_enc_key, mac_key) = crypto::derive_session_keys(key, rnd_a, rnd_b);
        Self {
            mac_key: *mac_key,
            key_no,
            counter: 0,
        }
    }

    /// Key slot the session was authenticated with
    pub(crate) const fn key_no(&self) -> u8 {
        self.key_no
    }

    /// Current command counter
    pub(crate) const fn counter(&self) -> u16 {
        self.counter
    }

    /// Append the command MAC to `frame`
    pub(crate) fn protect(&self, frame: &[u8]) -> Vec<u8> {
        let mac = crypto::command_mac(&self.mac_key, self.counter, frame);
        let mut protected = Vec::with_capacity(frame.len() + mac.len());
        protected.extend_from_slice(frame);
        protected.extend_from_slice(&mac);
        protected
    }

    /// Check a protected command frame and return the frame without MAC
    pub(crate) fn check_command<'a>(&self, protected: &'a [u8]) -> Option<&'a [u8]> {
        let split = protected.len().checked_sub(MAC_LENGTH)?;
        let (frame, mac) = protected.split_at(split);
        let expected = crypto::command_mac(&self.mac_key, self.counter, frame);
        crypto::mac_eq(&expected, mac).then_some(frame)
    }

    /// Advance the counter after a command was accepted
    pub(crate) fn advance(&mut self) -> Result<()> {
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(Error::Authentication("session counter exhausted"))?;
        Ok(())
    }

    /// MAC for response `data` under the current counter
    pub(crate) fn response_mac(&self, data: &[u8]) -> Mac {
        crypto::response_mac(&self.mac_key, self.counter, data)
    }

    /// Split a protected answer into data and MAC, checking the MAC when
    /// `verify` is set
    pub(crate) fn open_response<'a>(&self, response: &'a [u8], verify: bool) -> Result<&'a [u8]> {
        let split = response
            .len()
            .checked_sub(MAC_LENGTH)
            .ok_or(Error::InvalidResponse("answer too short for MAC"))?;
        let (data, mac) = response.split_at(split);
        if verify && !crypto::mac_eq(&self.response_mac(data), mac) {
            return Err(Error::Integrity("response MAC mismatch"));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::establish(&[0x11; 16], 1, &[0xA0; 16], &[0xB0; 16])
    }

    #[test]
    fn test_command_protection() {
        let session = session();
        let frame = [0x30, 0x04];
        let protected = session.protect(&frame);
        assert_eq!(protected.len(), 10);
        assert_eq!(session.check_command(&protected), Some(&frame[..]));

        let mut tampered = protected.clone();
        tampered[1] = 0x05;
        assert_eq!(session.check_command(&tampered), None);
        assert_eq!(session.check_command(&[0x30]), None);
    }

    #[test]
    fn test_counter_binds_macs() {
        let mut session = session();
        let protected = session.protect(&[0x30, 0x04]);
        session.advance().unwrap();
        assert_eq!(session.counter(), 1);
        assert_eq!(session.check_command(&protected), None);
    }

    #[test]
    fn test_response_verification() {
        let session = session();
        let mut answer = vec![0x0A];
        answer.extend_from_slice(&session.response_mac(&[0x0A]));

        assert_eq!(session.open_response(&answer, true).unwrap(), &[0x0A]);

        let last = answer.len() - 1;
        answer[last] ^= 1;
        assert!(matches!(
            session.open_response(&answer, true),
            Err(Error::Integrity(_))
        ));
        // Unverified sessions only strip the MAC
        assert_eq!(session.open_response(&answer, false).unwrap(), &[0x0A]);
        assert!(matches!(
            session.open_response(&[1, 2], false),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_counter_exhaustion() {
        let mut session = session();
        session.counter = u16::MAX;
        assert!(matches!(
            session.advance(),
            Err(Error::Authentication("session counter exhausted"))
        ));
    }

    #[test]
    fn test_sessions_with_other_randoms_do_not_verify() {
        let session = session();
        let other = Session::establish(&[0x11; 16], 1, &[0xA1; 16], &[0xB0; 16]);
        assert_eq!(session.key_no(), 1);
        assert_eq!(other.check_command(&session.protect(&[0x60])), None);
    }
}
