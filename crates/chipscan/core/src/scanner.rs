//! Scan engine
//!
//! [`TagScanner`] reads the current keys for every call, refuses operations
//! whose mandatory keys are missing without any I/O, and otherwise hands a
//! keyed request to the transport. It keeps no state between calls and does
//! not retry; retry and timeout policy belongs to the caller.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    KeyStore, ReadMode, ScanFailure, ScanKind, ScanRequest, ScanResult, ScannerConfig,
    TagTransport,
};

/// Drives Read, Write and Test transactions against a tag transport
#[derive(Debug)]
pub struct TagScanner<T> {
    keys: Arc<KeyStore>,
    transport: T,
    config: ScannerConfig,
}

impl<T: TagTransport> TagScanner<T> {
    /// Create a scanner with the default configuration
    pub fn new(keys: Arc<KeyStore>, transport: T) -> Self {
        Self {
            keys,
            transport,
            config: ScannerConfig::default(),
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// The key store this scanner reads from
    pub const fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The active configuration
    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Read UID and payload using the configured read mode
    pub async fn read(&self) -> ScanResult {
        self.read_with_mode(self.config.read_mode).await
    }

    /// Read UID and payload using an explicit read mode
    ///
    /// Requires the UID retrieval key. Without a data protection key the
    /// payload comes back [`Unprotected`](crate::Protection::Unprotected).
    pub async fn read_with_mode(&self, mode: ReadMode) -> ScanResult {
        let keys = self.keys.current_keys();
        let Some(uid_retrieval_key) = keys.uid_retrieval() else {
            return Self::refuse(ScanKind::Read);
        };

        self.dispatch(ScanRequest::Read {
            mode,
            uid_retrieval_key: uid_retrieval_key.clone(),
            data_protection_key: keys.data_protection().cloned(),
        })
        .await
    }

    /// Write a payload to the tag
    ///
    /// Requires the UID retrieval key. Without a data protection key the
    /// payload is stored in the clear.
    pub async fn write(&self, payload: impl Into<Bytes>) -> ScanResult {
        let keys = self.keys.current_keys();
        let Some(uid_retrieval_key) = keys.uid_retrieval() else {
            return Self::refuse(ScanKind::Write);
        };

        self.dispatch(ScanRequest::Write {
            payload: payload.into(),
            uid_retrieval_key: uid_retrieval_key.clone(),
            data_protection_key: keys.data_protection().cloned(),
        })
        .await
    }

    /// Check that the presented tag works with the current keys
    ///
    /// Requires both keys. A partial key set never reports success.
    pub async fn test(&self) -> ScanResult {
        let keys = self.keys.current_keys();
        let (Some(uid_retrieval_key), Some(data_protection_key)) =
            (keys.uid_retrieval(), keys.data_protection())
        else {
            return Self::refuse(ScanKind::Test);
        };

        self.dispatch(ScanRequest::Test {
            uid_retrieval_key: uid_retrieval_key.clone(),
            data_protection_key: data_protection_key.clone(),
        })
        .await
    }

    /// Abandon a pending scan; the keys are not affected
    pub fn cancel(&self) {
        debug!("Stopping tag transport");
        self.transport.stop_listening();
    }

    fn refuse(kind: ScanKind) -> ScanResult {
        warn!(operation = %kind, "Refusing scan, required tag key is not set");
        Err(ScanFailure::NoKey)
    }

    async fn dispatch(&self, request: ScanRequest) -> ScanResult {
        let kind = request.kind();
        debug!(operation = %kind, "Starting tag transaction");

        let result = self.transport.scan(request).await;
        match &result {
            Ok(tag) => debug!(operation = %kind, uid = %tag.uid, "Tag transaction succeeded"),
            Err(failure) => debug!(operation = %kind, %failure, "Tag transaction failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::transport::MockTransport;
    use crate::{KEY_LENGTH, TagKey, TagKeys, TagSecret, TransportError};

    fn key(byte: u8) -> TagKey {
        TagKey::new([byte; KEY_LENGTH])
    }

    fn scanner(keys: TagKeys, transport: MockTransport) -> TagScanner<MockTransport> {
        TagScanner::new(Arc::new(KeyStore::with_keys(keys)), transport)
    }

    #[tokio::test]
    async fn test_unset_keys_refuse_without_io() {
        let scanner = scanner(TagKeys::empty(), MockTransport::with_uid(&[1, 2, 3]));

        assert_eq!(scanner.read().await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.write(&b"hello"[..]).await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.test().await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_data_key_alone_is_not_enough() {
        let scanner = scanner(
            TagKeys::new(None, Some(key(0x22))),
            MockTransport::with_uid(&[1]),
        );

        assert_eq!(scanner.read().await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.write(&b"x"[..]).await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.test().await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_test_requires_both_keys() {
        let scanner = scanner(
            TagKeys::new(Some(key(0x11)), None),
            MockTransport::with_uid(&[1]),
        );

        assert_eq!(scanner.test().await, Err(ScanFailure::NoKey));
        assert_eq!(scanner.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_read_and_write_with_uid_key_only() {
        let scanner = scanner(
            TagKeys::new(Some(key(0x11)), None),
            MockTransport::with_uid(&[0x04, 0x01]),
        );

        let tag = scanner.read().await.unwrap();
        assert_eq!(tag.uid.as_ref(), &[0x04, 0x01]);
        match scanner.transport().last_request() {
            Some(ScanRequest::Read {
                mode,
                uid_retrieval_key,
                data_protection_key,
            }) => {
                assert_eq!(mode, ReadMode::secure());
                assert_eq!(uid_retrieval_key.as_bytes(), &[0x11; KEY_LENGTH]);
                assert!(data_protection_key.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }

        scanner.write(&b"payload"[..]).await.unwrap();
        match scanner.transport().last_request() {
            Some(ScanRequest::Write {
                payload,
                data_protection_key,
                ..
            }) => {
                assert_eq!(payload.as_ref(), b"payload");
                assert!(data_protection_key.is_none());
            }
            other => panic!("unexpected request {other:?}"),
        }
        assert_eq!(scanner.transport().calls(), 2);
    }

    #[tokio::test]
    async fn test_test_passes_both_keys() {
        let scanner = scanner(
            TagKeys::new(Some(key(0x11)), Some(key(0x22))),
            MockTransport::with_uid(&[1]),
        );

        scanner.test().await.unwrap();
        match scanner.transport().last_request() {
            Some(ScanRequest::Test {
                uid_retrieval_key,
                data_protection_key,
            }) => {
                assert_eq!(uid_retrieval_key.as_bytes(), &[0x11; KEY_LENGTH]);
                assert_eq!(data_protection_key.as_bytes(), &[0x22; KEY_LENGTH]);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configured_read_mode_is_used() {
        let scanner = scanner(
            TagKeys::new(Some(key(0x11)), None),
            MockTransport::with_uid(&[1]),
        )
        .with_config(ScannerConfig::new().with_read_mode(ReadMode::Fast));

        scanner.read().await.unwrap();
        assert!(matches!(
            scanner.transport().last_request(),
            Some(ScanRequest::Read {
                mode: ReadMode::Fast,
                ..
            })
        ));

        let mode = ReadMode::Full {
            auth: false,
            cmac: false,
        };
        scanner.read_with_mode(mode).await.unwrap();
        assert!(matches!(
            scanner.transport().last_request(),
            Some(ScanRequest::Read { mode: m, .. }) if m == mode
        ));
    }

    #[tokio::test]
    async fn test_transport_failures_pass_through() {
        let failures = [
            ScanFailure::Incompatible("NTAG215".to_string()),
            ScanFailure::AuthFailed,
            ScanFailure::IntegrityFailed,
            ScanFailure::CommError(TransportError::TagRemoved),
        ];

        for failure in failures {
            let scanner = scanner(
                TagKeys::new(Some(key(0x11)), Some(key(0x22))),
                MockTransport::failing(failure.clone()),
            );
            assert_eq!(scanner.read().await, Err(failure.clone()));
            assert_eq!(scanner.write(&b"x"[..]).await, Err(failure.clone()));
            assert_eq!(scanner.test().await, Err(failure));
        }
    }

    #[tokio::test]
    async fn test_new_keys_are_seen_by_next_scan() {
        let scanner = scanner(TagKeys::empty(), MockTransport::with_uid(&[1]));
        assert_eq!(scanner.test().await, Err(ScanFailure::NoKey));

        scanner
            .key_store()
            .set_tag_secret(&TagSecret::new(
                "000102030405060708090a0b0c0d0e0f",
                "00102030405060708090a0b0c0d0e0f0",
            ))
            .unwrap();

        scanner.test().await.unwrap();
        let request = scanner.transport().last_request().unwrap();
        assert_eq!(request.uid_retrieval_key().as_bytes()[15], 0xf0);
        assert_eq!(request.data_protection_key().unwrap().as_bytes()[15], 0x0f);
    }

    #[tokio::test]
    async fn test_cancel_reaches_transport_and_keeps_keys() {
        let scanner = scanner(
            TagKeys::new(Some(key(0x11)), Some(key(0x22))),
            MockTransport::with_uid(&[1]),
        );
        scanner.cancel();

        assert_eq!(*scanner.transport().stops.lock(), 1);
        assert!(!scanner.key_store().current_keys().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scans_never_mix_key_halves_under_concurrent_updates() {
        let pair = |n: u8| TagKeys::new(Some(key((n << 4) | 1)), Some(key((n << 4) | 2)));
        let scanner = Arc::new(scanner(pair(1), MockTransport::with_uid(&[1])));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = Arc::clone(scanner.key_store());
            let done = Arc::clone(&done);
            tokio::task::spawn_blocking(move || {
                for i in 0..2_000u32 {
                    store.set_keys(pair(if i % 2 == 0 { 2 } else { 1 }));
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let scanner = Arc::clone(&scanner);
            let done = Arc::clone(&done);
            readers.push(tokio::spawn(async move {
                while !done.load(Ordering::Acquire) {
                    scanner.test().await.unwrap();
                    let request = scanner.transport().last_request().unwrap();
                    let uid = request.uid_retrieval_key().as_bytes()[0];
                    let data = request.data_protection_key().unwrap().as_bytes()[0];
                    assert_eq!(uid >> 4, data >> 4, "mixed key pair reached transport");
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
