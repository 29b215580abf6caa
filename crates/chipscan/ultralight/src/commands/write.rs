//! WRITE command for a single page

use crate::{
    Result,
    constants::{cmd, layout::PAGE_SIZE},
};

use super::expect_ack;

/// WRITE command, writes a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCommand {
    /// Target page
    pub page: u8,
    /// Page contents
    pub data: [u8; PAGE_SIZE],
}

impl WriteCommand {
    /// Write `data` to `page`
    pub const fn new(page: u8, data: [u8; PAGE_SIZE]) -> Self {
        Self { page, data }
    }

    /// Build the command frame
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(2 + PAGE_SIZE);
        frame.push(cmd::WRITE);
        frame.push(self.page);
        frame.extend_from_slice(&self.data);
        frame
    }

    /// The tag answers a successful write with ACK
    pub fn parse_response(&self, response: &[u8]) -> Result<()> {
        expect_ack(response)
    }
}
