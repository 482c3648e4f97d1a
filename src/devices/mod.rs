//! Device registry
//!
//! Stores device metadata and the time each device was last heard from.
//! Online/offline status is never stored: it is derived on every listing
//! from the age of the last contact.

pub mod config;
pub mod device;
pub mod store;

pub use config::DeviceConfig;
pub use device::{Device, DeviceId, DeviceStatus, Registration};
pub use store::DeviceRegistry;
