//! Device registry implementation

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::config::DeviceConfig;
use super::device::{Device, DeviceId, DeviceStatus, Registration};

/// Stored device metadata
#[derive(Debug, Clone)]
struct DeviceRecord {
    id: DeviceId,
    name: String,
    model: String,
    os_version: String,
    last_contact: DateTime<Utc>,
}

impl DeviceRecord {
    fn to_device(&self, status: DeviceStatus, streaming: bool) -> Device {
        Device {
            id: self.id.clone(),
            name: self.name.clone(),
            model: self.model.clone(),
            os_version: self.os_version.clone(),
            last_contact: self.last_contact,
            status,
            streaming,
        }
    }
}

/// Records in registration order plus an id index
#[derive(Default)]
struct DeviceTable {
    records: Vec<DeviceRecord>,
    index: HashMap<DeviceId, usize>,
}

/// In-memory registry of every device seen since process start
///
/// Devices are never removed. Registration always succeeds and always
/// creates a new entry, even for a name/model pair seen before.
pub struct DeviceRegistry {
    table: RwLock<DeviceTable>,
    config: DeviceConfig,
}

impl DeviceRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: DeviceConfig) -> Self {
        Self {
            table: RwLock::new(DeviceTable::default()),
            config,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Register a device and return its freshly assigned identifier
    pub async fn register(&self, registration: Registration) -> DeviceId {
        self.register_at(registration, Utc::now()).await
    }

    /// Register a device with an explicit contact time
    pub async fn register_at(&self, registration: Registration, now: DateTime<Utc>) -> DeviceId {
        let id = DeviceId::generate();
        let record = DeviceRecord {
            id: id.clone(),
            name: registration
                .name
                .unwrap_or_else(|| self.config.default_name.clone()),
            model: registration.model.unwrap_or_default(),
            os_version: registration.os_version.unwrap_or_default(),
            last_contact: now,
        };

        let mut table = self.table.write().await;
        let position = table.records.len();
        table.index.insert(id.clone(), position);

        tracing::info!(
            device = %id,
            name = %record.name,
            model = %record.model,
            os_version = %record.os_version,
            total = position + 1,
            "Device registered"
        );

        table.records.push(record);
        id
    }

    /// List all devices with status computed against the current time
    pub async fn list(&self, is_streaming: impl Fn(&DeviceId) -> bool) -> Vec<Device> {
        self.list_at(Utc::now(), is_streaming).await
    }

    /// List all devices with status computed against `now`
    ///
    /// Devices appear in registration order.
    pub async fn list_at(
        &self,
        now: DateTime<Utc>,
        is_streaming: impl Fn(&DeviceId) -> bool,
    ) -> Vec<Device> {
        let table = self.table.read().await;

        table
            .records
            .iter()
            .map(|record| {
                let status =
                    DeviceStatus::at(record.last_contact, now, self.config.online_window);
                record.to_device(status, is_streaming(&record.id))
            })
            .collect()
    }

    /// Look up a single device
    pub async fn get(&self, id: &DeviceId, streaming: bool) -> Option<Device> {
        let table = self.table.read().await;
        let position = *table.index.get(id)?;
        let record = &table.records[position];
        let status = DeviceStatus::at(record.last_contact, Utc::now(), self.config.online_window);
        Some(record.to_device(status, streaming))
    }

    /// Refresh a device's last contact time
    ///
    /// Returns false for identifiers the registry has never seen.
    pub async fn touch(&self, id: &DeviceId) -> bool {
        self.touch_at(id, Utc::now()).await
    }

    pub async fn touch_at(&self, id: &DeviceId, now: DateTime<Utc>) -> bool {
        let mut table = self.table.write().await;
        let Some(&position) = table.index.get(id) else {
            return false;
        };
        table.records[position].last_contact = now;
        tracing::trace!(device = %id, "Device contact refreshed");
        true
    }

    /// Number of registered devices
    pub async fn len(&self) -> usize {
        self.table.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
