//! Transport seam between the scan engine and tag hardware
//!
//! A transport owns everything radio specific: waiting for a tag, framing,
//! the authentication handshake and MAC computation. It receives a fully
//! keyed [`ScanRequest`] and returns a classified [`ScanResult`].

pub mod error;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
pub use error::TransportError;

use crate::{ScanRequest, ScanResult};

/// Trait for tag transports
///
/// Implementations serve one transaction at a time; a physical reader has a
/// single field.
#[async_trait]
pub trait TagTransport: Send + Sync + fmt::Debug {
    /// Execute one transaction against the next tag presented
    async fn scan(&self, request: ScanRequest) -> ScanResult;

    /// Stop waiting for a tag
    ///
    /// A pending [`scan`](Self::scan) returns
    /// [`TransportError::Cancelled`] wrapped in a communication failure.
    fn stop_listening(&self);
}

#[async_trait]
impl<T: TagTransport + ?Sized> TagTransport for Arc<T> {
    async fn scan(&self, request: ScanRequest) -> ScanResult {
        (**self).scan(request).await
    }

    fn stop_listening(&self) {
        (**self).stop_listening()
    }
}

#[cfg(test)]
pub(crate) use mock::MockTransport;
