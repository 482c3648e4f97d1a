//! Producer and viewer session types
//!
//! This module defines the per-device state stored in the relay and the
//! handles given to the connection tasks that own each session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::event::RelayEvent;
use crate::devices::DeviceId;
use crate::stats::ProducerStats;

/// The live producer attached to a device
pub(super) struct ProducerSession {
    /// Owning connection's session ID
    pub session_id: u64,

    /// Inbound frame counters
    pub stats: ProducerStats,

    /// Fired (or dropped) when this session stops being the producer
    supersede: Option<oneshot::Sender<()>>,
}

impl ProducerSession {
    /// Create a session and the lease handed to its connection
    pub(super) fn new(device_id: DeviceId, session_id: u64) -> (Self, ProducerLease) {
        let (tx, rx) = oneshot::channel();

        let session = Self {
            session_id,
            stats: ProducerStats::new(),
            supersede: Some(tx),
        };
        let lease = ProducerLease {
            device_id,
            session_id,
            released: rx,
        };

        (session, lease)
    }

    /// Tell the owning connection it has been replaced
    pub(super) fn supersede(mut self) {
        if let Some(tx) = self.supersede.take() {
            let _ = tx.send(());
        }
    }
}

/// Handle held by a producer connection for as long as it owns the feed
pub struct ProducerLease {
    device_id: DeviceId,
    session_id: u64,
    released: oneshot::Receiver<()>,
}

impl ProducerLease {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Resolves once this session is no longer the device's producer
    ///
    /// Happens when another producer replaces it, or when its session is
    /// removed from the relay. Must not be awaited again after it resolves.
    pub async fn superseded(&mut self) {
        let _ = (&mut self.released).await;
    }
}

/// Outcome of offering one event to a set of viewers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Viewers that accepted the event
    pub delivered: usize,
    /// Viewers with a full frame buffer; they miss this frame
    pub full: usize,
    /// Viewers whose connection already closed
    pub closed: usize,
}

/// Sending half of one viewer's queue
///
/// The queue itself is unbounded so presence events always get in. Frames
/// are limited separately: at most `frame_limit` may be waiting at once.
pub(super) struct ViewerHandle {
    tx: mpsc::UnboundedSender<RelayEvent>,
    queued_frames: Arc<AtomicUsize>,
    frame_limit: usize,
}

impl ViewerHandle {
    /// Create a viewer queue holding at most `frame_limit` pending frames
    pub(super) fn channel(
        device_id: DeviceId,
        session_id: u64,
        frame_limit: usize,
    ) -> (Self, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queued_frames = Arc::new(AtomicUsize::new(0));

        let handle = Self {
            tx,
            queued_frames: queued_frames.clone(),
            frame_limit: frame_limit.max(1),
        };
        let subscription = Subscription {
            device_id,
            session_id,
            rx,
            queued_frames,
        };

        (handle, subscription)
    }

    /// Queue a presence event; only fails if the viewer is gone
    pub(super) fn notify(&self, event: RelayEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    fn offer(&self, event: &RelayEvent, delivery: &mut Delivery) {
        if self.tx.is_closed() {
            delivery.closed += 1;
            return;
        }

        if event.is_frame() {
            let queued = self.queued_frames.fetch_add(1, Ordering::AcqRel);
            if queued >= self.frame_limit {
                self.queued_frames.fetch_sub(1, Ordering::AcqRel);
                delivery.full += 1;
                return;
            }
        }

        match self.tx.send(event.clone()) {
            Ok(()) => delivery.delivered += 1,
            Err(_) => {
                if event.is_frame() {
                    self.queued_frames.fetch_sub(1, Ordering::AcqRel);
                }
                delivery.closed += 1;
            }
        }
    }
}

/// Viewer connections watching one device
#[derive(Default)]
pub(super) struct ViewerSet {
    members: HashMap<u64, ViewerHandle>,
}

impl ViewerSet {
    pub(super) fn insert(&mut self, session_id: u64, handle: ViewerHandle) {
        self.members.insert(session_id, handle);
    }

    pub(super) fn remove(&mut self, session_id: u64) -> bool {
        self.members.remove(&session_id).is_some()
    }

    pub(super) fn len(&self) -> usize {
        self.members.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Offer an event to every member without waiting
    ///
    /// Frames are dropped for members whose frame buffer is full; presence
    /// events are always queued. Closed members are skipped but left in the
    /// set; their connection task removes them when it unsubscribes.
    pub(super) fn fan_out(&self, event: &RelayEvent) -> Delivery {
        let mut delivery = Delivery::default();

        for handle in self.members.values() {
            handle.offer(event, &mut delivery);
        }

        delivery
    }
}

/// A viewer's receiving end
pub struct Subscription {
    device_id: DeviceId,
    session_id: u64,
    rx: mpsc::UnboundedReceiver<RelayEvent>,
    queued_frames: Arc<AtomicUsize>,
}

impl Subscription {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the relay has dropped this viewer.
    pub async fn recv(&mut self) -> Option<RelayEvent> {
        let event = self.rx.recv().await?;
        Some(self.release(event))
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<RelayEvent> {
        let event = self.rx.try_recv().ok()?;
        Some(self.release(event))
    }

    fn release(&self, event: RelayEvent) -> RelayEvent {
        if event.is_frame() {
            self.queued_frames.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }
}

/// Stream status for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub device_id: DeviceId,
    /// Whether a producer is attached
    pub streaming: bool,
    /// Number of open viewer connections
    pub viewers: usize,
}
