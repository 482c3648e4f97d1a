//! Device registry configuration

use std::time::Duration;

/// Name given to devices that register without one
pub const DEFAULT_DEVICE_NAME: &str = "Dispositivo Android";

/// Configuration for the device registry
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// A device is online while its last contact is younger than this
    pub online_window: Duration,

    /// Display name used when registration omits one
    pub default_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            online_window: Duration::from_secs(60),
            default_name: DEFAULT_DEVICE_NAME.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Set the online window
    pub fn online_window(mut self, window: Duration) -> Self {
        self.online_window = window;
        self
    }

    /// Set the default display name
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }
}
