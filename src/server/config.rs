//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::devices::DeviceConfig;
use crate::error::{Error, Result};
use crate::hub::HubConfig;
use crate::relay::RelayConfig;

/// Port used when none is supplied
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent relay sockets (0 = unlimited)
    pub max_connections: usize,

    /// Interval between WebSocket pings on relay sockets
    pub ping_interval: Duration,

    /// Close a relay socket after this long without inbound traffic
    pub idle_timeout: Duration,

    /// Stream relay settings
    pub relay: RelayConfig,

    /// Device registry settings
    pub devices: DeviceConfig,

    /// Hub behaviour
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 0, // Unlimited
            ping_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(45),
            relay: RelayConfig::default(),
            devices: DeviceConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Listen on all interfaces at `port`
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum relay sockets
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    pub fn devices(mut self, devices: DeviceConfig) -> Self {
        self.devices = devices;
        self
    }

    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Reject settings the liveness check cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval.is_zero() {
            return Err(Error::Config("ping interval must be non-zero".into()));
        }
        if self.idle_timeout <= self.ping_interval {
            return Err(Error::Config(format!(
                "idle timeout ({:?}) must exceed ping interval ({:?})",
                self.idle_timeout, self.ping_interval
            )));
        }
        Ok(())
    }
}
