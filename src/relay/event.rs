//! Events delivered to viewers
//!
//! Every message on a viewer connection is a JSON envelope tagged by `type`,
//! which separates frame data from presence changes.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use serde::{Serialize, Serializer};

use crate::devices::DeviceId;

/// An opaque frame as received from a producer
///
/// Cheap to clone: both variants are reference-counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// Text message, forwarded verbatim (typically a base64 data URL)
    Text(Arc<str>),
    /// Binary message, base64-encoded on the way out
    Binary(Bytes),
}

impl FramePayload {
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        FramePayload::Text(text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        FramePayload::Binary(data.into())
    }

    /// Size of the payload as received
    pub fn len(&self) -> usize {
        match self {
            FramePayload::Text(text) => text.len(),
            FramePayload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for FramePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FramePayload::Text(text) => serializer.serialize_str(text),
            FramePayload::Binary(data) => serializer.serialize_str(&STANDARD.encode(data)),
        }
    }
}

/// Envelope sent to viewers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// One frame from the device's producer
    #[serde(rename_all = "camelCase")]
    Frame {
        device_id: DeviceId,
        frame: FramePayload,
        /// Relay time in milliseconds since the Unix epoch
        timestamp: i64,
    },

    /// The device now has a producer
    #[serde(rename_all = "camelCase")]
    StreamOnline { device_id: DeviceId },

    /// The device's producer went away
    #[serde(rename_all = "camelCase")]
    StreamOffline { device_id: DeviceId },
}

impl RelayEvent {
    /// Wrap a frame, stamping it with the current time
    pub fn frame(device_id: DeviceId, frame: FramePayload) -> Self {
        RelayEvent::Frame {
            device_id,
            frame,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn stream_online(device_id: DeviceId) -> Self {
        RelayEvent::StreamOnline { device_id }
    }

    pub fn stream_offline(device_id: DeviceId) -> Self {
        RelayEvent::StreamOffline { device_id }
    }

    pub fn device_id(&self) -> &DeviceId {
        match self {
            RelayEvent::Frame { device_id, .. }
            | RelayEvent::StreamOnline { device_id }
            | RelayEvent::StreamOffline { device_id } => device_id,
        }
    }

    /// Frames may be dropped for slow viewers; presence events may not
    pub fn is_frame(&self) -> bool {
        matches!(self, RelayEvent::Frame { .. })
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::Frame { .. } => "frame",
            RelayEvent::StreamOnline { .. } => "stream_online",
            RelayEvent::StreamOffline { .. } => "stream_offline",
        }
    }

    /// Encode as the JSON text sent over the viewer socket
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    fn parse(event: &RelayEvent) -> Value {
        serde_json::from_str(&event.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_frame_envelope_text() {
        let event = RelayEvent::frame(DeviceId::new("d1"), FramePayload::text("data:image/jpeg;base64,AAAA"));
        let json = parse(&event);

        assert_eq!(json["type"], "frame");
        assert_eq!(json["deviceId"], "d1");
        assert_eq!(json["frame"], "data:image/jpeg;base64,AAAA");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_frame_envelope_binary_is_base64() {
        let event = RelayEvent::frame(
            DeviceId::new("d1"),
            FramePayload::binary(Bytes::from_static(&[0xFF, 0xD8, 0xFF])),
        );
        let json = parse(&event);

        assert_eq!(json["frame"], "/9j/");
    }

    #[test]
    fn test_presence_envelopes() {
        assert_eq!(
            parse(&RelayEvent::stream_online(DeviceId::new("d1"))),
            json!({"type": "stream_online", "deviceId": "d1"})
        );
        assert_eq!(
            parse(&RelayEvent::stream_offline(DeviceId::new("d1"))),
            json!({"type": "stream_offline", "deviceId": "d1"})
        );
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let events = [
            RelayEvent::frame(DeviceId::new("d"), FramePayload::text("x")),
            RelayEvent::stream_online(DeviceId::new("d")),
            RelayEvent::stream_offline(DeviceId::new("d")),
        ];

        for event in &events {
            assert_eq!(parse(event)["type"], event.kind());
            assert_eq!(event.device_id().as_str(), "d");
        }
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(FramePayload::text("abc").len(), 3);
        assert_eq!(FramePayload::binary(vec![1u8, 2]).len(), 2);
        assert!(FramePayload::text("").is_empty());
    }
}
