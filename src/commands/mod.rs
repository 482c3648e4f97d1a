//! Per-device command mailboxes
//!
//! The dashboard enqueues instructions; the device drains its mailbox when it
//! polls. Delivery is at-most-once: a drained command is gone whether or not
//! the device acts on it.

pub mod command;
pub mod queue;

pub use command::{CommandKind, PendingCommand};
pub use queue::CommandQueue;
