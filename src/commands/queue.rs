//! Command queue implementation

use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use super::command::{CommandKind, PendingCommand};
use crate::devices::DeviceId;

/// FIFO mailbox per device identifier
///
/// Mailboxes are created on first enqueue and are unbounded. The queue does
/// not consult the device registry, so commands for unknown identifiers are
/// accepted and held until someone drains them.
pub struct CommandQueue {
    mailboxes: Mutex<HashMap<DeviceId, VecDeque<PendingCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Append a command to a device's mailbox
    pub async fn enqueue(&self, device_id: &DeviceId, kind: CommandKind) -> PendingCommand {
        let mut mailboxes = self.mailboxes.lock().await;
        // Stamped under the lock so timestamps follow queue order
        let command = PendingCommand::new(kind);
        let mailbox = mailboxes.entry(device_id.clone()).or_default();
        mailbox.push_back(command);

        tracing::debug!(
            device = %device_id,
            kind = %kind,
            pending = mailbox.len(),
            "Command queued"
        );

        command
    }

    /// Take every pending command for a device, oldest first
    ///
    /// The mailbox is emptied in the same step, so a second drain with no
    /// enqueue in between returns nothing.
    pub async fn drain(&self, device_id: &DeviceId) -> Vec<PendingCommand> {
        let mut mailboxes = self.mailboxes.lock().await;
        let commands: Vec<PendingCommand> = match mailboxes.get_mut(device_id) {
            Some(mailbox) => mailbox.drain(..).collect(),
            None => Vec::new(),
        };

        if !commands.is_empty() {
            tracing::debug!(
                device = %device_id,
                count = commands.len(),
                "Commands drained"
            );
        }

        commands
    }

    /// Number of commands waiting for a device
    pub async fn pending(&self, device_id: &DeviceId) -> usize {
        self.mailboxes
            .lock()
            .await
            .get(device_id)
            .map_or(0, VecDeque::len)
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
