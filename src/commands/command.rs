//! Command types

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Instruction a device can be asked to carry out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Lock the device screen
    Lock,
    /// Unlock the device screen
    Unlock,
    /// Start pushing the camera feed to the relay
    CameraStart,
    /// Stop pushing the camera feed
    CameraStop,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Lock => "LOCK",
            CommandKind::Unlock => "UNLOCK",
            CommandKind::CameraStart => "CAMERA_START",
            CommandKind::CameraStop => "CAMERA_STOP",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued command awaiting the device's next poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub kind: CommandKind,
    /// Enqueue time in milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl PendingCommand {
    /// Create a command stamped with the current time
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
