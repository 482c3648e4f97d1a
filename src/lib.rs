//! Device fleet control server with a live camera relay
//!
//! Devices register, poll for queued commands, and optionally push a live
//! camera feed over a WebSocket. Dashboards list devices, queue commands, and
//! watch feeds through viewer WebSockets.
//!
//! # Components
//!
//! - [`devices::DeviceRegistry`]: device metadata with an online/offline heuristic
//! - [`commands::CommandQueue`]: per-device FIFO mailbox with destructive drain
//! - [`relay::StreamRelay`]: one producer per device, fan-out to any number of viewers
//! - [`hub::FleetHub`]: composes the three services for the gateway
//! - [`server::FleetServer`]: HTTP + WebSocket gateway built on axum
//!
//! # Example
//!
//! ```no_run
//! use fleet_relay::{FleetServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> fleet_relay::Result<()> {
//!     let server = FleetServer::new(ServerConfig::with_port(3000));
//!     server.run().await
//! }
//! ```

pub mod commands;
pub mod devices;
pub mod error;
pub mod hub;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use commands::{CommandKind, CommandQueue, PendingCommand};
pub use devices::{Device, DeviceId, DeviceRegistry, DeviceStatus};
pub use error::{Error, Result};
pub use hub::{FleetHub, HubConfig};
pub use relay::{ProducerPolicy, RelayConfig, RelayEvent, StreamRelay};
pub use server::{FleetServer, ServerConfig};
