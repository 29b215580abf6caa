//! Native command frames
//!
//! Each command knows how to build its frame and how to interpret the
//! answer once the channel has stripped any session MAC. NAK handling
//! happens in the channel, so parsers only ever see positive answers.

pub mod authenticate;
pub mod get_version;
pub mod read;
pub mod write;

pub use authenticate::AuthenticateCommand;
pub use get_version::{GetVersionCommand, TagModel, VersionInfo};
pub use read::ReadCommand;
pub use write::WriteCommand;

use crate::{
    Error, Result,
    constants::ack::{ACK, NAK_AUTH},
};

/// Return the NAK code when `response` is a negative acknowledge
pub(crate) fn nak_code(response: &[u8]) -> Option<u8> {
    match response {
        [code] if *code != ACK => Some(*code),
        _ => None,
    }
}

/// Turn a NAK code into the matching error
pub(crate) fn nak_error(code: u8) -> Error {
    match code {
        NAK_AUTH => Error::Authentication("access denied by tag"),
        code => Error::Nak(code),
    }
}

/// Expect a bare acknowledge
pub(crate) fn expect_ack(response: &[u8]) -> Result<()> {
    match response {
        [ACK] => Ok(()),
        [code] => Err(nak_error(*code)),
        _ => Err(Error::InvalidResponse("expected acknowledge")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ack::NAK_INVALID_ARGUMENT;

    #[test]
    fn test_nak_detection() {
        assert_eq!(nak_code(&[NAK_AUTH]), Some(NAK_AUTH));
        assert_eq!(nak_code(&[ACK]), None);
        assert_eq!(nak_code(&[0x00, 0x01]), None);

        assert!(expect_ack(&[ACK]).is_ok());
        assert!(matches!(
            expect_ack(&[NAK_INVALID_ARGUMENT]),
            Err(Error::Nak(NAK_INVALID_ARGUMENT))
        ));
        assert!(matches!(
            expect_ack(&[NAK_AUTH]),
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            expect_ack(&[ACK, ACK]),
            Err(Error::InvalidResponse(_))
        ));
    }
}
