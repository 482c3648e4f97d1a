//! Fleet hub
//!
//! Composes the device registry, the command queue, and the stream relay
//! into the operations the gateway exposes. The hub is cheap to clone; all
//! clones share the same services.

use std::sync::Arc;

use crate::commands::{CommandKind, CommandQueue, PendingCommand};
use crate::devices::{Device, DeviceConfig, DeviceId, DeviceRegistry, Registration};
use crate::relay::{RelayConfig, StreamRelay, StreamStatus};
use crate::stats::RelayStats;

/// Hub behaviour switches
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Refresh a device's last contact each time it polls for commands
    ///
    /// Off by default: last contact is only stamped at registration, so a
    /// device reads as offline one online window after it registers.
    pub refresh_on_poll: bool,
}

impl HubConfig {
    pub fn refresh_on_poll(mut self, enabled: bool) -> Self {
        self.refresh_on_poll = enabled;
        self
    }
}

/// Shared handle to the fleet services
#[derive(Clone)]
pub struct FleetHub {
    devices: Arc<DeviceRegistry>,
    commands: Arc<CommandQueue>,
    relay: Arc<StreamRelay>,
    config: HubConfig,
}

impl FleetHub {
    /// Create a hub with default configuration for every service
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default(), RelayConfig::default(), HubConfig::default())
    }

    pub fn with_config(devices: DeviceConfig, relay: RelayConfig, config: HubConfig) -> Self {
        Self {
            devices: Arc::new(DeviceRegistry::with_config(devices)),
            commands: Arc::new(CommandQueue::new()),
            relay: Arc::new(StreamRelay::with_config(relay)),
            config,
        }
    }

    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    pub fn commands(&self) -> &Arc<CommandQueue> {
        &self.commands
    }

    pub fn relay(&self) -> &Arc<StreamRelay> {
        &self.relay
    }

    pub async fn register(&self, registration: Registration) -> DeviceId {
        self.devices.register(registration).await
    }

    /// Every registered device with fresh status and streaming flags
    pub async fn list_devices(&self) -> Vec<Device> {
        let streaming = self.relay.streaming_devices().await;
        self.devices.list(|id| streaming.contains(id)).await
    }

    /// Drain a device's mailbox on its behalf
    pub async fn poll_commands(&self, device_id: &DeviceId) -> Vec<PendingCommand> {
        if self.config.refresh_on_poll {
            self.devices.touch(device_id).await;
        }
        self.commands.drain(device_id).await
    }

    pub async fn lock(&self, device_id: &DeviceId) -> PendingCommand {
        self.commands.enqueue(device_id, CommandKind::Lock).await
    }

    pub async fn unlock(&self, device_id: &DeviceId) -> PendingCommand {
        self.commands.enqueue(device_id, CommandKind::Unlock).await
    }

    /// Ask the device to start pushing its camera
    ///
    /// Only queues a command; the relay sees a producer once the device has
    /// polled, acted on it, and connected.
    pub async fn start_camera(&self, device_id: &DeviceId) -> PendingCommand {
        self.commands
            .enqueue(device_id, CommandKind::CameraStart)
            .await
    }

    pub async fn stop_camera(&self, device_id: &DeviceId) -> PendingCommand {
        self.commands
            .enqueue(device_id, CommandKind::CameraStop)
            .await
    }

    pub async fn camera_status(&self, device_id: &DeviceId) -> StreamStatus {
        self.relay.status(device_id).await
    }

    pub async fn relay_stats(&self) -> RelayStats {
        self.relay.stats().await
    }
}

impl Default for FleetHub {
    fn default() -> Self {
        Self::new()
    }
}
