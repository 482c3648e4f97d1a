//! Relay error types

use crate::devices::DeviceId;

/// Error type for relay operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// A live producer already owns this device's feed
    #[error("device already has a live producer: {0}")]
    ProducerAlreadyActive(DeviceId),

    /// The session is not (or is no longer) the device's producer
    #[error("session {session_id} is not the producer for {device}")]
    ProducerMismatch { device: DeviceId, session_id: u64 },
}
