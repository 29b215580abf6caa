//! READ command, four pages per frame

use crate::{
    Error, Result,
    constants::{cmd, layout},
};

/// READ command, returns four consecutive pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCommand {
    /// First page to read
    pub page: u8,
}

impl ReadCommand {
    /// Read four pages starting at `page`
    pub const fn new(page: u8) -> Self {
        Self { page }
    }

    /// Build the command frame
    pub fn to_frame(&self) -> Vec<u8> {
        vec![cmd::READ, self.page]
    }

    /// Parse the sixteen bytes of page data
    pub fn parse_response(&self, response: &[u8]) -> Result<[u8; layout::READ_SIZE]> {
        response
            .try_into()
            .map_err(|_| Error::InvalidResponse("READ answer has wrong length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_frame_and_answer() {
        let command = ReadCommand::new(0x04);
        assert_eq!(command.to_frame(), vec![0x30, 0x04]);
        assert_eq!(command.parse_response(&[7u8; 16]).unwrap(), [7u8; 16]);
        assert!(command.parse_response(&[7u8; 15]).is_err());
    }
}
