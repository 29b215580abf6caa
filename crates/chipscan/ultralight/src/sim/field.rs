use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chipscan_core::TransportError;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::link::{TagField, TagLink};

use super::SimulatedTag;

#[derive(Debug, Default)]
struct Slot {
    tag: Option<Arc<Mutex<SimulatedTag>>>,
    // Bumped whenever a tag enters or leaves, so stale links notice
    generation: u64,
}

#[derive(Debug, Default)]
struct FieldState {
    slot: Mutex<Slot>,
    changed: Notify,
    cancel_epoch: AtomicU64,
}

/// Simulated reader field holding at most one tag
///
/// Clones share the same field.
#[derive(Debug, Clone, Default)]
pub struct SimulatedField {
    state: Arc<FieldState>,
}

impl SimulatedField {
    /// Empty field
    pub fn new() -> Self {
        Self::default()
    }

    /// Field with `tag` already present
    pub fn with_tag(tag: SimulatedTag) -> Self {
        let field = Self::new();
        field.present(tag);
        field
    }

    /// Bring `tag` into the field, replacing any tag already there
    pub fn present(&self, tag: SimulatedTag) {
        {
            let mut slot = self.state.slot.lock();
            debug!(?tag, "Tag entered simulated field");
            slot.tag = Some(Arc::new(Mutex::new(tag)));
            slot.generation += 1;
        }
        self.state.changed.notify_waiters();
    }

    /// Take the tag out of the field
    pub fn remove(&self) {
        let mut slot = self.state.slot.lock();
        if slot.tag.take().is_some() {
            debug!("Tag left simulated field");
            slot.generation += 1;
        }
    }

    /// Whether a tag is in the field
    pub fn is_present(&self) -> bool {
        self.state.slot.lock().tag.is_some()
    }

    /// Run `f` against the tag in the field
    pub fn inspect<R>(&self, f: impl FnOnce(&mut SimulatedTag) -> R) -> Option<R> {
        let tag = self.state.slot.lock().tag.clone()?;
        let mut tag = tag.lock();
        Some(f(&mut tag))
    }

    fn try_activate(&self) -> Option<SimulatedLink> {
        let slot = self.state.slot.lock();
        let tag = slot.tag.clone()?;
        let uid = tag.lock().activate();
        Some(SimulatedLink {
            field: Arc::clone(&self.state),
            tag,
            generation: slot.generation,
            uid,
        })
    }
}

#[async_trait]
impl TagField for SimulatedField {
    type Link = SimulatedLink;

    async fn activate(&self) -> Result<SimulatedLink, TransportError> {
        let epoch = self.state.cancel_epoch.load(Ordering::Acquire);
        loop {
            let mut changed = pin!(self.state.changed.notified());
            changed.as_mut().enable();

            if self.state.cancel_epoch.load(Ordering::Acquire) != epoch {
                debug!("Stopped waiting for a tag");
                return Err(TransportError::Cancelled);
            }
            if let Some(link) = self.try_activate() {
                return Ok(link);
            }
            changed.await;
        }
    }

    fn stop_listening(&self) {
        self.state.cancel_epoch.fetch_add(1, Ordering::AcqRel);
        self.state.changed.notify_waiters();
    }
}

/// Link to a tag in a [`SimulatedField`]
#[derive(Debug)]
pub struct SimulatedLink {
    field: Arc<FieldState>,
    tag: Arc<Mutex<SimulatedTag>>,
    generation: u64,
    uid: Bytes,
}

impl TagLink for SimulatedLink {
    fn do_transceive(&mut self, frame: &[u8]) -> Result<Bytes, TransportError> {
        if self.field.slot.lock().generation != self.generation {
            return Err(TransportError::TagRemoved);
        }

        let mut tag = self.tag.lock();
        if tag.has_departed() {
            return Err(TransportError::TagRemoved);
        }
        Ok(Bytes::from(tag.process(frame)))
    }

    fn anticollision_uid(&self) -> Bytes {
        self.uid.clone()
    }
}
