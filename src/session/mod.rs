//! Relay connection sessions
//!
//! A WebSocket connection is classified once, at upgrade time, from its
//! path. The resulting role never changes for the lifetime of the
//! connection.

pub mod context;

pub use context::{ConnectionRole, SessionContext};
