//! [`TagTransport`] implementation for Ultralight AES tags

use async_trait::async_trait;
use bytes::Bytes;
use chipscan_core::{
    ReadMode, ScanFailure, ScanRequest, ScanResult, ScannedTag, TagKey, TagPayload, TagTransport,
    TagUid,
};
use rand::{RngCore, rng};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    Error, Result,
    channel::TagChannel,
    constants::{
        key_no,
        layout::{PAYLOAD_PAGES, PAYLOAD_START, SCRATCH_START},
        payload_format,
    },
    crypto::{self, purpose},
    link::{TagField, TagLink},
    payload::{self, StoredPayload},
};

/// Header page marking the payload area empty while a write is in progress
const EMPTY_HEADER: [u8; 4] = [payload_format::EMPTY, 0, 0, 0];

/// Length of the random part of a Test probe
const PROBE_LENGTH: usize = 8;

/// Transport running Ultralight AES transactions over a [`TagField`]
///
/// Transactions are serialised; a second scan waits until the first one
/// has finished with its tag.
#[derive(Debug)]
pub struct UltralightTransport<F> {
    field: F,
    transaction: Mutex<()>,
}

impl<F: TagField> UltralightTransport<F> {
    /// Create a transport over `field`
    pub fn new(field: F) -> Self {
        Self {
            field,
            transaction: Mutex::new(()),
        }
    }

    /// The underlying field
    pub const fn field(&self) -> &F {
        &self.field
    }
}

#[async_trait]
impl<F: TagField> TagTransport for UltralightTransport<F> {
    async fn scan(&self, request: ScanRequest) -> ScanResult {
        let _transaction = self.transaction.lock().await;

        debug!(operation = %request.kind(), "Waiting for tag");
        let link = self.field.activate().await?;
        let mut channel = TagChannel::new(link);

        let result = execute(&mut channel, &request);
        if let Err(e) = &result {
            debug!(operation = %request.kind(), error = %e, "Tag transaction aborted");
        }
        result.map_err(ScanFailure::from)
    }

    fn stop_listening(&self) {
        self.field.stop_listening();
    }
}

/// Run one transaction against an activated tag
pub(crate) fn execute<L: TagLink>(
    channel: &mut TagChannel<L>,
    request: &ScanRequest,
) -> Result<ScannedTag> {
    check_compatibility(channel)?;

    match request {
        ScanRequest::Read {
            mode,
            uid_retrieval_key,
            data_protection_key,
        } => read(
            channel,
            *mode,
            uid_retrieval_key,
            data_protection_key.as_ref(),
        ),
        ScanRequest::Write {
            payload,
            uid_retrieval_key,
            data_protection_key,
        } => write(
            channel,
            payload,
            uid_retrieval_key,
            data_protection_key.as_ref(),
        ),
        ScanRequest::Test {
            uid_retrieval_key,
            data_protection_key,
        } => test(channel, uid_retrieval_key, data_protection_key),
    }
}

fn check_compatibility<L: TagLink>(channel: &mut TagChannel<L>) -> Result<()> {
    let version = match channel.get_version() {
        Ok(version) => version,
        Err(Error::Nak(_) | Error::Authentication(_)) => {
            return Err(Error::Incompatible("GET_VERSION not supported".to_string()));
        }
        Err(e) => return Err(e),
    };
    debug!(%version, "Tag identified");
    version.ensure_supported()
}

fn read<L: TagLink>(
    channel: &mut TagChannel<L>,
    mode: ReadMode,
    uid_retrieval_key: &TagKey,
    data_protection_key: Option<&TagKey>,
) -> Result<ScannedTag> {
    let ReadMode::Full { .. } = mode else {
        return Ok(ScannedTag::new(
            TagUid::new(channel.anticollision_uid()),
            None,
        ));
    };

    let uid = if mode.needs_session() {
        channel.authenticate(
            key_no::UID_RETRIEVAL,
            uid_retrieval_key,
            mode.verifies_cmac(),
        )?;
        channel.read_uid()?
    } else {
        channel.anticollision_uid()
    };

    let area = channel.read_range(PAYLOAD_START, PAYLOAD_PAGES)?;
    let payload = match (payload::decode_area(&area)?, data_protection_key) {
        (StoredPayload::Empty, _) => None,
        (StoredPayload::Plain(_), Some(_)) => {
            return Err(Error::Integrity("payload is not sealed"));
        }
        (StoredPayload::Sealed(body), Some(key)) => Some(TagPayload::verified(payload::open(
            key.as_bytes(),
            &uid,
            &body,
        )?)),
        (StoredPayload::Plain(body) | StoredPayload::Sealed(body), None) => {
            Some(TagPayload::unprotected(body))
        }
    };

    info!(uid = %hex::encode_upper(&uid), "Tag read");
    Ok(ScannedTag::new(TagUid::new(uid), payload))
}

fn write<L: TagLink>(
    channel: &mut TagChannel<L>,
    data: &Bytes,
    uid_retrieval_key: &TagKey,
    data_protection_key: Option<&TagKey>,
) -> Result<ScannedTag> {
    channel.authenticate(key_no::UID_RETRIEVAL, uid_retrieval_key, true)?;
    let uid = channel.read_uid()?;

    let encoded = match data_protection_key {
        Some(key) => payload::seal(key.as_bytes(), &uid, data)?,
        None => payload::encode_plain(data)?,
    };
    channel.write_range_committed(PAYLOAD_START, &encoded, EMPTY_HEADER)?;

    info!(uid = %hex::encode_upper(&uid), size = data.len(), "Payload written");
    Ok(ScannedTag::new(TagUid::new(uid), None))
}

fn test<L: TagLink>(
    channel: &mut TagChannel<L>,
    uid_retrieval_key: &TagKey,
    data_protection_key: &TagKey,
) -> Result<ScannedTag> {
    // Proves the tag holds the same data protection key as the host
    channel.authenticate(key_no::DATA_PROTECTION, data_protection_key, true)?;
    channel.authenticate(key_no::UID_RETRIEVAL, uid_retrieval_key, true)?;
    let uid = channel.read_uid()?;

    let record = probe_record(data_protection_key, &uid);
    channel.write_range(SCRATCH_START, &record)?;
    let readback = channel.read_pages(SCRATCH_START)?;

    if !crypto::mac_eq(&readback, &record) {
        return Err(Error::Integrity("diagnostic probe read back differs"));
    }

    info!(uid = %hex::encode_upper(&uid), "Tag test passed");
    Ok(ScannedTag::new(TagUid::new(uid), None))
}

fn probe_record(data_protection_key: &TagKey, uid: &[u8]) -> Vec<u8> {
    let mut probe = [0u8; PROBE_LENGTH];
    rng().fill_bytes(&mut probe);

    let mac_key = crypto::diversify(data_protection_key.as_bytes(), purpose::PROBE_MAC, uid);
    let mut record = probe.to_vec();
    record.extend_from_slice(&probe_mac(&mac_key, uid, &probe));
    record
}

fn probe_mac(mac_key: &crypto::AesKey, uid: &[u8], probe: &[u8]) -> crypto::Mac {
    let mut input = Vec::with_capacity(uid.len() + probe.len());
    input.extend_from_slice(uid);
    input.extend_from_slice(probe);
    crypto::truncated_mac(mac_key, &input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedField, SimulatedTag};

    const UID: [u8; 7] = [0x04, 0x51, 0x3C, 0x9A, 0x22, 0x6B, 0x80];
    const KEY0: [u8; 16] = [0x10; 16];
    const KEY1: [u8; 16] = [0x20; 16];

    async fn channel(tag: SimulatedTag) -> TagChannel<crate::sim::SimulatedLink> {
        let field = SimulatedField::with_tag(tag);
        TagChannel::new(field.activate().await.unwrap())
    }

    fn write_request(payload: &'static [u8], data_key: Option<[u8; 16]>) -> ScanRequest {
        ScanRequest::Write {
            payload: Bytes::from_static(payload),
            uid_retrieval_key: TagKey::new(KEY1),
            data_protection_key: data_key.map(TagKey::new),
        }
    }

    #[tokio::test]
    async fn test_write_then_read_on_one_channel() {
        let mut channel = channel(SimulatedTag::new(UID).with_keys(KEY0, KEY1)).await;

        execute(&mut channel, &write_request(b"hello", Some(KEY0))).unwrap();
        let tag = execute(
            &mut channel,
            &ScanRequest::Read {
                mode: ReadMode::secure(),
                uid_retrieval_key: TagKey::new(KEY1),
                data_protection_key: Some(TagKey::new(KEY0)),
            },
        )
        .unwrap();

        assert_eq!(tag.uid.as_ref(), &UID);
        let payload = tag.payload.unwrap();
        assert!(payload.is_verified());
        assert_eq!(payload.data.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_plain_payload_rejected_when_data_key_present() {
        let mut channel = channel(SimulatedTag::new(UID).with_keys(KEY0, KEY1)).await;
        execute(&mut channel, &write_request(b"plain", None)).unwrap();

        let result = execute(
            &mut channel,
            &ScanRequest::Read {
                mode: ReadMode::secure(),
                uid_retrieval_key: TagKey::new(KEY1),
                data_protection_key: Some(TagKey::new(KEY0)),
            },
        );
        assert!(matches!(result, Err(Error::Integrity("payload is not sealed"))));
    }

    #[tokio::test]
    async fn test_interrupted_write_never_mixes_payloads() {
        let old = [b'A'; 40];
        let new = [b'B'; 40];
        let encoded_old = payload::encode_plain(&old).unwrap();

        // Version, two auth frames and the UID read come first, then one
        // frame per page: marker, eleven body pages, header
        for departure in 4..=17 {
            let mut tag = SimulatedTag::new(UID)
                .with_keys(KEY0, KEY1)
                .with_departure_after(departure);
            for (i, page) in encoded_old.chunks(4).enumerate() {
                let mut contents = [0u8; 4];
                contents[..page.len()].copy_from_slice(page);
                tag.set_page(PAYLOAD_START + i as u8, contents);
            }
            let field = SimulatedField::with_tag(tag);
            let mut channel = TagChannel::new(field.activate().await.unwrap());

            let request = ScanRequest::Write {
                payload: Bytes::copy_from_slice(&new),
                uid_retrieval_key: TagKey::new(KEY1),
                data_protection_key: None,
            };
            let written = execute(&mut channel, &request);

            let area = field
                .inspect(|tag| tag.pages(PAYLOAD_START, PAYLOAD_PAGES))
                .unwrap();
            let stored = payload::decode_area(&area).unwrap();
            match (written.is_ok(), stored) {
                (true, StoredPayload::Plain(data)) => assert_eq!(data.as_ref(), &new[..]),
                (false, StoredPayload::Plain(data)) => {
                    assert_eq!(data.as_ref(), &old[..], "departure after {departure}")
                }
                (false, StoredPayload::Empty) => {}
                (ok, other) => panic!("departure after {departure}: {ok} {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_forged_response_macs() {
        let forged = || SimulatedTag::new(UID).with_keys(KEY0, KEY1).with_forged_response_macs();
        let read = |mode| ScanRequest::Read {
            mode,
            uid_retrieval_key: TagKey::new(KEY1),
            data_protection_key: None,
        };

        let mut verified = channel(forged()).await;
        assert!(matches!(
            execute(&mut verified, &read(ReadMode::secure())),
            Err(Error::Integrity("response MAC mismatch"))
        ));

        let mut unverified = channel(forged()).await;
        let mode = ReadMode::Full {
            auth: true,
            cmac: false,
        };
        let tag = execute(&mut unverified, &read(mode)).unwrap();
        assert_eq!(tag.uid.as_ref(), &UID);
    }

    #[tokio::test]
    async fn test_test_leaves_probe_in_scratch_area() {
        let field = SimulatedField::with_tag(SimulatedTag::new(UID).with_keys(KEY0, KEY1));
        let mut channel = TagChannel::new(field.activate().await.unwrap());

        let request = ScanRequest::Test {
            uid_retrieval_key: TagKey::new(KEY1),
            data_protection_key: TagKey::new(KEY0),
        };
        execute(&mut channel, &request).unwrap();

        let scratch = field.inspect(|tag| tag.pages(SCRATCH_START, 4)).unwrap();
        let mac_key = crypto::diversify(&KEY0, purpose::PROBE_MAC, &UID);
        assert_eq!(&scratch[8..], &probe_mac(&mac_key, &UID, &scratch[..8]));
    }
}
