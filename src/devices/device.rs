//! Device identity and metadata types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a device
///
/// Assigned at registration, but any string arriving on a request path or a
/// WebSocket path is accepted as an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Derived reachability of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl DeviceStatus {
    /// Classify a device by how long ago it was last heard from
    ///
    /// A device is online while `now - last_contact` is strictly below
    /// `window`. Contact stamped in the future counts as online.
    pub fn at(last_contact: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        if now.signed_duration_since(last_contact) < window {
            DeviceStatus::Online
        } else {
            DeviceStatus::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == DeviceStatus::Online
    }
}

/// A device as reported to the dashboard
///
/// `status` and `streaming` are recomputed on every listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub model: String,
    pub os_version: String,
    pub last_contact: DateTime<Utc>,
    pub status: DeviceStatus,
    pub streaming: bool,
}

/// Registration payload sent by a device
///
/// Parsing never fails: a body that is not a JSON object, or fields that are
/// missing or not strings, leave the corresponding value unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub name: Option<String>,
    pub model: Option<String>,
    pub os_version: Option<String>,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        os_version: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            model: Some(model.into()),
            os_version: Some(os_version.into()),
        }
    }

    /// Leniently parse a registration body
    ///
    /// Accepts both the English field names and the Portuguese ones older
    /// Android clients send (`nome`, `modelo`, `androidVersion`).
    pub fn from_json(body: &[u8]) -> Self {
        let Ok(serde_json::Value::Object(fields)) = serde_json::from_slice(body) else {
            return Self::default();
        };

        let pick = |keys: &[&str]| {
            keys.iter().find_map(|key| {
                fields
                    .get(*key)
                    .and_then(|v| v.as_str())
                    .map(str::to_owned)
            })
        };

        Self {
            name: pick(&["name", "nome"]),
            model: pick(&["model", "modelo"]),
            os_version: pick(&["osVersion", "androidVersion"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DeviceId::generate();
        let b = DeviceId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_status_window_boundaries() {
        let now = Utc::now();
        let window = Duration::from_secs(60);

        let recent = now - chrono::Duration::seconds(59);
        let stale = now - chrono::Duration::seconds(61);
        let exact = now - chrono::Duration::seconds(60);

        assert_eq!(DeviceStatus::at(recent, now, window), DeviceStatus::Online);
        assert_eq!(DeviceStatus::at(stale, now, window), DeviceStatus::Offline);
        assert_eq!(DeviceStatus::at(exact, now, window), DeviceStatus::Offline);
    }

    #[test]
    fn test_status_future_contact_is_online() {
        let now = Utc::now();
        let ahead = now + chrono::Duration::seconds(5);
        assert!(DeviceStatus::at(ahead, now, Duration::from_secs(60)).is_online());
    }

    #[test]
    fn test_registration_english_fields() {
        let reg = Registration::from_json(br#"{"name":"Pixel","model":"P1","osVersion":"13"}"#);
        assert_eq!(reg, Registration::new("Pixel", "P1", "13"));
    }

    #[test]
    fn test_registration_portuguese_fields() {
        let reg = Registration::from_json(
            br#"{"nome":"Celular","modelo":"Moto G","androidVersion":"12"}"#,
        );
        assert_eq!(reg.name.as_deref(), Some("Celular"));
        assert_eq!(reg.model.as_deref(), Some("Moto G"));
        assert_eq!(reg.os_version.as_deref(), Some("12"));
    }

    #[test]
    fn test_registration_malformed_body() {
        assert_eq!(Registration::from_json(b"not json"), Registration::default());
        assert_eq!(Registration::from_json(b"[1,2,3]"), Registration::default());
        assert_eq!(Registration::from_json(b""), Registration::default());
    }

    #[test]
    fn test_registration_wrong_field_types() {
        let reg = Registration::from_json(br#"{"name":42,"model":"P1","osVersion":null}"#);
        assert_eq!(reg.name, None);
        assert_eq!(reg.model.as_deref(), Some("P1"));
        assert_eq!(reg.os_version, None);
    }

    #[test]
    fn test_device_serializes_camel_case() {
        let device = Device {
            id: DeviceId::new("abc"),
            name: "Pixel".into(),
            model: "P1".into(),
            os_version: "13".into(),
            last_contact: Utc::now(),
            status: DeviceStatus::Online,
            streaming: false,
        };

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["osVersion"], "13");
        assert_eq!(json["status"], "online");
        assert_eq!(json["streaming"], false);
        assert!(json["lastContact"].is_string());
    }
}
