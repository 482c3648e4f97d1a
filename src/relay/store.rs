//! Stream relay implementation
//!
//! The central relay that tracks producer and viewer sessions per device and
//! routes frames and presence events between them.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::config::{ProducerPolicy, RelayConfig};
use super::entry::{
    ProducerLease, ProducerSession, StreamStatus, Subscription, ViewerHandle, ViewerSet,
};
use super::error::RelayError;
use super::event::{FramePayload, RelayEvent};
use crate::devices::DeviceId;
use crate::stats::{RelayCounters, RelayStats};

/// Session maps guarded together so every membership change is atomic
#[derive(Default)]
struct RelayState {
    producers: HashMap<DeviceId, ProducerSession>,
    viewers: HashMap<DeviceId, ViewerSet>,
}

/// Central relay for all live camera feeds
///
/// Thread-safe via a single `RwLock`. Frame fan-out only needs the read lock;
/// session attach/detach takes the write lock.
pub struct StreamRelay {
    state: RwLock<RelayState>,

    /// Running totals
    counters: RelayCounters,

    /// Configuration
    config: RelayConfig,
}

impl StreamRelay {
    /// Create a new relay with default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a new relay with custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            state: RwLock::new(RelayState::default()),
            counters: RelayCounters::new(),
            config,
        }
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Attach a producer for a device
    ///
    /// If the device already has a producer, the configured
    /// [`ProducerPolicy`] decides: `Reject` returns an error and leaves the
    /// current producer alone, `Replace` fires the current producer's lease
    /// and installs the newcomer. Viewers already watching are sent
    /// `stream_online` when the device goes from no producer to one.
    pub async fn register_producer(
        &self,
        device_id: &DeviceId,
        session_id: u64,
    ) -> Result<ProducerLease, RelayError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let Some(current) = state.producers.get(device_id) {
            if self.config.producer_policy == ProducerPolicy::Reject {
                tracing::warn!(
                    device = %device_id,
                    current = current.session_id,
                    rejected = session_id,
                    "Producer rejected, device already streaming"
                );
                return Err(RelayError::ProducerAlreadyActive(device_id.clone()));
            }
        }

        let (session, lease) = ProducerSession::new(device_id.clone(), session_id);
        let previous = state.producers.insert(device_id.clone(), session);
        self.counters.record_producer();

        match previous {
            Some(previous) => {
                tracing::info!(
                    device = %device_id,
                    session_id = session_id,
                    superseded = previous.session_id,
                    "Producer replaced"
                );
                previous.supersede();
            }
            None => {
                let delivery = state
                    .viewers
                    .get(device_id)
                    .map(|viewers| viewers.fan_out(&RelayEvent::stream_online(device_id.clone())))
                    .unwrap_or_default();

                tracing::info!(
                    device = %device_id,
                    session_id = session_id,
                    viewers = delivery.delivered,
                    "Producer attached"
                );
            }
        }

        Ok(lease)
    }

    /// Detach a producer
    ///
    /// Only the current producer's session may detach; calls from any other
    /// session are ignored. Every viewer of the device is sent
    /// `stream_offline` and stays subscribed.
    pub async fn unregister_producer(&self, device_id: &DeviceId, session_id: u64) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let current = state.producers.get(device_id).map(|p| p.session_id);
        if current != Some(session_id) {
            tracing::warn!(
                device = %device_id,
                expected = ?current,
                actual = session_id,
                "Producer unregister ignored, session is not current"
            );
            return false;
        }

        let Some(session) = state.producers.remove(device_id) else {
            return false;
        };

        let delivery = state
            .viewers
            .get(device_id)
            .map(|viewers| viewers.fan_out(&RelayEvent::stream_offline(device_id.clone())))
            .unwrap_or_default();

        tracing::info!(
            device = %device_id,
            session_id = session_id,
            frames = session.stats.frames(),
            bytes = session.stats.bytes(),
            bitrate = session.stats.bitrate(),
            duration_secs = session.stats.duration().as_secs(),
            viewers = delivery.delivered,
            "Producer detached"
        );

        true
    }

    /// Relay one frame from a device's producer to its viewers
    ///
    /// Returns the number of viewers whose channel accepted the frame.
    /// Frames from a session that is not the current producer are refused.
    pub async fn publish_frame(
        &self,
        device_id: &DeviceId,
        session_id: u64,
        payload: FramePayload,
    ) -> Result<usize, RelayError> {
        let state = self.state.read().await;

        let producer = state
            .producers
            .get(device_id)
            .filter(|p| p.session_id == session_id)
            .ok_or_else(|| RelayError::ProducerMismatch {
                device: device_id.clone(),
                session_id,
            })?;
        producer.stats.record_frame(payload.len());

        let Some(viewers) = state.viewers.get(device_id) else {
            self.counters.record_frame(0, 0, 0);
            return Ok(0);
        };

        let delivery = viewers.fan_out(&RelayEvent::frame(device_id.clone(), payload));
        self.counters
            .record_frame(delivery.delivered, delivery.full, delivery.closed);

        if delivery.full > 0 || delivery.closed > 0 {
            tracing::debug!(
                device = %device_id,
                dropped = delivery.full,
                closed = delivery.closed,
                "Frame not delivered to every viewer"
            );
        }

        Ok(delivery.delivered)
    }

    /// Subscribe a viewer to a device
    ///
    /// If the device is streaming, `stream_online` is queued for this viewer
    /// only. Viewers may subscribe to devices that have no producer yet.
    pub async fn subscribe(&self, device_id: &DeviceId, session_id: u64) -> Subscription {
        let (handle, subscription) =
            ViewerHandle::channel(device_id.clone(), session_id, self.config.viewer_buffer);
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let streaming = state.producers.contains_key(device_id);
        if streaming {
            handle.notify(RelayEvent::stream_online(device_id.clone()));
        }

        let viewers = state.viewers.entry(device_id.clone()).or_default();
        viewers.insert(session_id, handle);
        self.counters.record_viewer();

        tracing::info!(
            device = %device_id,
            session_id = session_id,
            viewers = viewers.len(),
            streaming = streaming,
            "Viewer subscribed"
        );

        subscription
    }

    /// Remove a viewer; the device's viewer set is dropped once empty
    pub async fn unsubscribe(&self, device_id: &DeviceId, session_id: u64) -> bool {
        let mut state = self.state.write().await;

        let Some(viewers) = state.viewers.get_mut(device_id) else {
            return false;
        };

        let removed = viewers.remove(session_id);
        let remaining = viewers.len();
        if viewers.is_empty() {
            state.viewers.remove(device_id);
        }

        tracing::debug!(
            device = %device_id,
            session_id = session_id,
            viewers = remaining,
            "Viewer removed"
        );

        removed
    }

    /// Producer presence and viewer count for a device
    pub async fn status(&self, device_id: &DeviceId) -> StreamStatus {
        let state = self.state.read().await;

        StreamStatus {
            device_id: device_id.clone(),
            streaming: state.producers.contains_key(device_id),
            viewers: state.viewers.get(device_id).map_or(0, ViewerSet::len),
        }
    }

    /// Check if a device has an attached producer
    pub async fn is_streaming(&self, device_id: &DeviceId) -> bool {
        self.state.read().await.producers.contains_key(device_id)
    }

    /// All devices that currently have a producer
    pub async fn streaming_devices(&self) -> HashSet<DeviceId> {
        self.state.read().await.producers.keys().cloned().collect()
    }

    /// Relay-wide statistics
    pub async fn stats(&self) -> RelayStats {
        let state = self.state.read().await;
        let active_viewers = state.viewers.values().map(ViewerSet::len).sum();
        self.counters
            .snapshot(state.producers.len(), active_viewers)
    }
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn device(id: &str) -> DeviceId {
        DeviceId::new(id)
    }

    fn drain(sub: &mut Subscription) -> Vec<RelayEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_register_producer() {
        let relay = StreamRelay::new();
        let d = device("d1");

        assert_ok!(relay.register_producer(&d, 1).await);
        assert!(relay.is_streaming(&d).await);

        // Can't register another producer
        let result = relay.register_producer(&d, 2).await;
        assert_eq!(
            result.err(),
            Some(RelayError::ProducerAlreadyActive(d.clone()))
        );
    }

    #[tokio::test]
    async fn test_subscribe_before_producer_gets_no_online() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let mut viewer = relay.subscribe(&d, 10).await;
        assert!(drain(&mut viewer).is_empty());

        let status = relay.status(&d).await;
        assert!(!status.streaming);
        assert_eq!(status.viewers, 1);
    }

    #[tokio::test]
    async fn test_subscribe_after_producer_gets_one_online() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let mut early = relay.subscribe(&d, 10).await;
        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let _ = drain(&mut early);

        let mut late = relay.subscribe(&d, 11).await;

        assert_eq!(drain(&mut late), vec![RelayEvent::stream_online(d.clone())]);
        // Existing viewer is not told again
        assert!(drain(&mut early).is_empty());
    }

    #[tokio::test]
    async fn test_producer_attach_announces_to_waiting_viewers() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let mut viewer = relay.subscribe(&d, 10).await;
        let _lease = relay.register_producer(&d, 1).await.unwrap();

        assert_eq!(drain(&mut viewer), vec![RelayEvent::stream_online(d.clone())]);
    }

    #[tokio::test]
    async fn test_frame_fan_out_is_per_device() {
        let relay = StreamRelay::new();
        let d1 = device("d1");
        let d2 = device("d2");

        let mut a = relay.subscribe(&d1, 10).await;
        let mut b = relay.subscribe(&d1, 11).await;
        let mut other = relay.subscribe(&d2, 12).await;
        let _lease = relay.register_producer(&d1, 1).await.unwrap();
        let _ = (drain(&mut a), drain(&mut b));

        let delivered = relay
            .publish_frame(&d1, 1, FramePayload::text("jpeg-bytes"))
            .await
            .unwrap();
        assert_eq!(delivered, 2);

        for viewer in [&mut a, &mut b] {
            let events = drain(viewer);
            assert_eq!(events.len(), 1);
            match &events[0] {
                RelayEvent::Frame {
                    device_id, frame, ..
                } => {
                    assert_eq!(device_id, &d1);
                    assert_eq!(frame, &FramePayload::text("jpeg-bytes"));
                }
                unexpected => panic!("expected frame, got {:?}", unexpected),
            }
        }
        assert!(drain(&mut other).is_empty());
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let relay = StreamRelay::new();
        let d = device("d1");
        let mut viewer = relay.subscribe(&d, 10).await;
        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let _ = drain(&mut viewer);

        for i in 0..20 {
            relay
                .publish_frame(&d, 1, FramePayload::text(format!("f{}", i)))
                .await
                .unwrap();
        }

        let frames: Vec<FramePayload> = drain(&mut viewer)
            .into_iter()
            .filter_map(|e| match e {
                RelayEvent::Frame { frame, .. } => Some(frame),
                _ => None,
            })
            .collect();
        let expected: Vec<FramePayload> =
            (0..20).map(|i| FramePayload::text(format!("f{}", i))).collect();
        assert_eq!(frames, expected);
    }

    #[tokio::test]
    async fn test_producer_disconnect_sends_offline_once() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let mut a = relay.subscribe(&d, 10).await;
        let mut b = relay.subscribe(&d, 11).await;
        let _ = (drain(&mut a), drain(&mut b));

        assert!(relay.unregister_producer(&d, 1).await);

        for viewer in [&mut a, &mut b] {
            assert_eq!(drain(viewer), vec![RelayEvent::stream_offline(d.clone())]);
        }

        let status = relay.status(&d).await;
        assert!(!status.streaming);
        // Viewers stay subscribed
        assert_eq!(status.viewers, 2);
    }

    #[tokio::test]
    async fn test_unregister_mismatch_is_ignored() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let _lease = relay.register_producer(&d, 1).await.unwrap();
        assert!(!relay.unregister_producer(&d, 99).await);
        assert!(relay.is_streaming(&d).await);

        assert!(!relay.unregister_producer(&device("nobody"), 1).await);
    }

    #[tokio::test]
    async fn test_viewer_count_tracks_connections() {
        let relay = StreamRelay::new();
        let d = device("d1");

        for (i, session_id) in (10..15).enumerate() {
            relay.subscribe(&d, session_id).await;
            assert_eq!(relay.status(&d).await.viewers, i + 1);
        }

        for (i, session_id) in (10..15).enumerate() {
            assert!(relay.unsubscribe(&d, session_id).await);
            assert_eq!(relay.status(&d).await.viewers, 4 - i);
        }

        // Empty set is removed entirely
        assert!(!relay.unsubscribe(&d, 10).await);
        assert_eq!(relay.stats().await.active_viewers, 0);
    }

    #[tokio::test]
    async fn test_producer_reconnect_keeps_viewers() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let _first = relay.register_producer(&d, 1).await.unwrap();
        let mut viewer = relay.subscribe(&d, 10).await;
        relay.unregister_producer(&d, 1).await;

        let _second = relay.register_producer(&d, 2).await.unwrap();

        assert_eq!(
            drain(&mut viewer),
            vec![
                RelayEvent::stream_online(d.clone()),
                RelayEvent::stream_offline(d.clone()),
                RelayEvent::stream_online(d.clone()),
            ]
        );
        let status = relay.status(&d).await;
        assert!(status.streaming);
        assert_eq!(status.viewers, 1);
    }

    #[tokio::test]
    async fn test_replace_policy_supersedes_first_producer() {
        let config = RelayConfig::default().producer_policy(ProducerPolicy::Replace);
        let relay = StreamRelay::with_config(config);
        let d = device("d1");

        let mut first = relay.register_producer(&d, 1).await.unwrap();
        let mut viewer = relay.subscribe(&d, 10).await;
        let _ = drain(&mut viewer);

        let second = relay.register_producer(&d, 2).await.unwrap();
        assert_eq!(second.session_id(), 2);

        // The first lease resolves immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), first.superseded())
            .await
            .expect("first producer should be superseded");

        // Presence did not change, so viewers hear nothing
        assert!(drain(&mut viewer).is_empty());

        // The old session can neither publish nor tear down the new one
        assert_err!(relay.publish_frame(&d, 1, FramePayload::text("stale")).await);
        assert!(!relay.unregister_producer(&d, 1).await);
        assert!(relay.is_streaming(&d).await);

        assert_ok!(relay.publish_frame(&d, 2, FramePayload::text("fresh")).await);
    }

    #[tokio::test]
    async fn test_publish_without_producer_is_refused() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let result = relay.publish_frame(&d, 1, FramePayload::text("x")).await;
        assert_eq!(
            result,
            Err(RelayError::ProducerMismatch {
                device: d.clone(),
                session_id: 1
            })
        );
    }

    #[tokio::test]
    async fn test_full_viewer_misses_frames() {
        let relay = StreamRelay::with_config(RelayConfig::default().viewer_buffer(2));
        let d = device("d1");

        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let mut slow = relay.subscribe(&d, 10).await;
        let _ = drain(&mut slow);

        let mut delivered = Vec::new();
        for i in 0..4 {
            delivered.push(
                relay
                    .publish_frame(&d, 1, FramePayload::text(format!("f{}", i)))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(delivered, vec![1, 1, 0, 0]);
        assert_eq!(drain(&mut slow).len(), 2);

        let stats = relay.stats().await;
        assert_eq!(stats.frames_relayed, 4);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.dropped_deliveries, 2);
    }

    #[tokio::test]
    async fn test_closed_viewer_is_skipped_not_pruned() {
        let relay = StreamRelay::new();
        let d = device("d1");

        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let gone = relay.subscribe(&d, 10).await;
        let mut alive = relay.subscribe(&d, 11).await;
        drop(gone);
        let _ = drain(&mut alive);

        let delivered = relay
            .publish_frame(&d, 1, FramePayload::text("x"))
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(relay.status(&d).await.viewers, 2);

        let stats = relay.stats().await;
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.closed_deliveries, 1);
        assert_eq!(stats.dropped_deliveries, 0);
    }

    #[tokio::test]
    async fn test_full_viewer_still_gets_offline() {
        let relay = StreamRelay::with_config(RelayConfig::default().viewer_buffer(2));
        let d = device("d1");

        let mut slow = relay.subscribe(&d, 10).await;
        let _lease = relay.register_producer(&d, 1).await.unwrap();
        for i in 0..3 {
            relay
                .publish_frame(&d, 1, FramePayload::text(format!("f{}", i)))
                .await
                .unwrap();
        }
        assert!(relay.unregister_producer(&d, 1).await);

        let kinds: Vec<&str> = drain(&mut slow).iter().map(RelayEvent::kind).collect();
        assert_eq!(kinds, ["stream_online", "frame", "frame", "stream_offline"]);
    }

    #[tokio::test]
    async fn test_frame_buffer_frees_as_viewer_reads() {
        let relay = StreamRelay::with_config(RelayConfig::default().viewer_buffer(1));
        let d = device("d1");

        let _lease = relay.register_producer(&d, 1).await.unwrap();
        let mut viewer = relay.subscribe(&d, 10).await;

        assert_eq!(relay.publish_frame(&d, 1, FramePayload::text("a")).await, Ok(1));
        assert_eq!(relay.publish_frame(&d, 1, FramePayload::text("b")).await, Ok(0));

        // Presence event queued at subscribe does not count against the buffer
        assert_eq!(viewer.try_recv(), Some(RelayEvent::stream_online(d.clone())));
        assert!(matches!(viewer.try_recv(), Some(RelayEvent::Frame { .. })));

        assert_eq!(relay.publish_frame(&d, 1, FramePayload::text("c")).await, Ok(1));
    }

    #[tokio::test]
    async fn test_streaming_devices_and_stats() {
        let relay = StreamRelay::new();
        let _a = relay.register_producer(&device("a"), 1).await.unwrap();
        let _b = relay.register_producer(&device("b"), 2).await.unwrap();
        relay.subscribe(&device("a"), 10).await;

        let live = relay.streaming_devices().await;
        assert_eq!(live.len(), 2);
        assert!(live.contains(&device("a")));

        let stats = relay.stats().await;
        assert_eq!(stats.active_producers, 2);
        assert_eq!(stats.active_viewers, 1);
        assert_eq!(stats.total_producer_sessions, 2);
        assert_eq!(stats.total_viewer_sessions, 1);
    }
}
