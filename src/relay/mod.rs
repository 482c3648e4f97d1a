//! Live camera relay
//!
//! The relay associates at most one producer (a device pushing its camera
//! feed) with each device identifier, and any number of viewers. Frames flow
//! from the producer to every viewer of the same device; presence events
//! (`stream_online` / `stream_offline`) tell viewers when a producer comes
//! and goes. Nothing flows from viewers back to the producer.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRelay>
//!                   ┌──────────────────────────────┐
//!                   │ producers: HashMap<DeviceId, │
//!                   │   ProducerSession>           │
//!                   │ viewers:   HashMap<DeviceId, │
//!                   │   ViewerSet { ViewerHandle }>│
//!                   └──────────────┬───────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!    [Producer]               [Viewer]                 [Viewer]
//!    socket.recv()            subscription.recv()      subscription.recv()
//!         │                        │                        │
//!         └──► relay.publish_frame() ──► fan_out() ───► WebSocket
//! ```
//!
//! # Delivery
//!
//! Each viewer has its own queue with a limit on pending frames. A frame
//! offered to a viewer that already has `viewer_buffer` frames waiting is
//! dropped for that viewer only. Presence events bypass the limit, so a slow
//! viewer never misses `stream_online` or `stream_offline`. A viewer whose
//! connection has closed is skipped. Events reach each viewer in the order
//! the relay produced them. Frame payloads are reference-counted, so fan-out
//! never copies the frame bytes.

pub mod config;
pub mod entry;
pub mod error;
pub mod event;
pub mod store;

pub use config::{ProducerPolicy, RelayConfig};
pub use entry::{Delivery, ProducerLease, StreamStatus, Subscription};
pub use error::RelayError;
pub use event::{FramePayload, RelayEvent};
pub use store::StreamRelay;
