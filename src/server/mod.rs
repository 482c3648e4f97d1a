//! HTTP and WebSocket gateway
//!
//! Serves the dashboard/device request API and the relay WebSockets on a
//! single port:
//!
//! | Path | Description |
//! |------|-------------|
//! | `POST /api/registrar` | Register a device |
//! | `GET /api/comandos/{id}` | Drain a device's pending commands |
//! | `POST /api/bloquear/{id}` | Queue `LOCK` |
//! | `POST /api/desbloquear/{id}` | Queue `UNLOCK` |
//! | `POST /api/camera/start/{id}` | Queue `CAMERA_START` |
//! | `POST /api/camera/stop/{id}` | Queue `CAMERA_STOP` |
//! | `GET /api/camera/status/{id}` | Producer presence and viewer count |
//! | `GET /api/dispositivos` | List devices |
//! | `GET /api/relay/stats` | Relay counters |
//! | `GET /ws/camera/{id}` | Producer WebSocket |
//! | `GET /ws/viewer/{id}` | Viewer WebSocket |

pub mod api;
pub mod config;
pub mod listener;
pub mod socket;

pub use config::ServerConfig;
pub use listener::FleetServer;
