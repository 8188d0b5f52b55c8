//! Device snapshot model.

use serde::{Deserialize, Serialize};

/// Hardware kind reported by the devices endpoint (`type` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Wi-Fi bridge, metadata only
    Bridge,
    /// Water sensor, the only kind with readings
    Sensor,
    /// Any code the exporter does not know about
    Unknown(i64),
}

impl DeviceKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Bridge,
            2 => Self::Sensor,
            other => Self::Unknown(other),
        }
    }

    /// Label used for the `device_type` metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Sensor => "sensor",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn has_readings(self) -> bool {
        matches!(self, Self::Sensor)
    }
}

/// Read-only device snapshot, refreshed once per collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub kind: DeviceKind,
    pub location_name: String,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: DeviceKind, location_name: impl Into<String>) -> Self {
        Self { id: id.into(), kind, location_name: location_name.into() }
    }

    /// Location name, or the device id when the location is unnamed.
    pub fn display_name(&self) -> &str {
        if self.location_name.is_empty() {
            &self.id
        } else {
            &self.location_name
        }
    }
}
