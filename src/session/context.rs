//! Session context
//!
//! Identity of a relay connection: who it is, which device it is bound to,
//! and in which role.

use std::net::SocketAddr;
use std::time::Instant;

use crate::devices::DeviceId;

/// Role of a relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Device pushing its camera feed
    Producer,
    /// Dashboard watching a device's feed
    Consumer,
}

impl ConnectionRole {
    /// Classify a WebSocket path (relative to the `/ws/` prefix)
    ///
    /// Recognized shapes are `camera/{id}` or `producer/{id}` for producers
    /// and `viewer/{id}` or `consumer/{id}` for consumers. Anything else,
    /// including an empty device id or trailing segments, is unclassified.
    pub fn classify(path: &str) -> Option<(ConnectionRole, DeviceId)> {
        let (prefix, device) = path.trim_start_matches('/').split_once('/')?;

        let role = match prefix {
            "camera" | "producer" => ConnectionRole::Producer,
            "viewer" | "consumer" => ConnectionRole::Consumer,
            _ => return None,
        };

        let device = device.trim_end_matches('/');
        if device.is_empty() || device.contains('/') {
            return None;
        }

        Some((role, DeviceId::new(device)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionRole::Producer => "producer",
            ConnectionRole::Consumer => "consumer",
        }
    }
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context for one classified relay connection
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Role fixed at connect time
    pub role: ConnectionRole,

    /// Device the connection is bound to
    pub device_id: DeviceId,

    /// Connection start time
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        role: ConnectionRole,
        device_id: DeviceId,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            role,
            device_id,
            connected_at: Instant::now(),
        }
    }
}
