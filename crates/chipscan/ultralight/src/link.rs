//! Frame level link to a tag in the field
//!
//! A [`TagField`] waits for a tag to enter the reader's field and activates
//! it. The resulting [`TagLink`] exchanges raw native command frames; it has
//! no knowledge of command structure, sessions or keys.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chipscan_core::TransportError;
use tracing::{debug, trace};

/// Raw frame exchange with an activated tag
pub trait TagLink: Send + fmt::Debug {
    /// Send a frame and return the tag's answer
    fn transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        trace!(frame = %hex::encode(frame), "Transmitting frame");
        let result = self.do_transceive(frame);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "Received frame"),
            Err(e) => debug!(error = %e, "Link error during transmission"),
        }
        result
    }

    /// Internal implementation of [`transceive`](Self::transceive)
    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError>;

    /// UID reported by the tag during anticollision
    ///
    /// Tags with random ID enabled report a fresh identifier per activation.
    fn anticollision_uid(&self) -> Bytes;
}

/// Reader field that activates tags
#[async_trait]
pub trait TagField: Send + Sync + fmt::Debug {
    /// Link type produced on activation
    type Link: TagLink;

    /// Wait for a tag and activate it
    async fn activate(&self) -> Result<Self::Link, TransportError>;

    /// Abort a pending [`activate`](Self::activate) with
    /// [`TransportError::Cancelled`]
    fn stop_listening(&self);
}
