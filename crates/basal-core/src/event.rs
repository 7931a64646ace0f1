//! Raw dosing events as reported by device uploads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw device record for a single data owner.
///
/// Events are produced upstream (parsing and schema validation happen there)
/// and are read-only to this engine. Fields the engine does not model are
/// preserved verbatim in `extra` so pass-through records survive unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    /// Unique identifier assigned upstream.
    pub id: String,

    /// Record type (e.g. "basal", "bolus", "deviceMeta").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Basal delivery mode, present on basal records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_type: Option<DeliveryType>,

    /// Bolus sub-type (e.g. "dual/normal").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,

    /// Upload source the record came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// Identifier of the physical device that produced the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Device-local timestamp, not timezone-aware.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_time: Option<NaiveDateTime>,

    /// Duration in milliseconds, when the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    /// For cancellation records, the id of the temp override being stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Absolute, timezone-aware timestamp. Present only on new-model events,
    /// which must pass through every stage untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Any additional fields, preserved as-is (value, scheduleName, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceEvent {
    /// New-model events carry an absolute `time` and are never joined.
    pub fn is_new_model(&self) -> bool {
        self.time.is_some()
    }

    pub fn is_basal(&self) -> bool {
        self.event_type == "basal"
    }

    pub fn is_scheduled_basal(&self) -> bool {
        self.is_basal() && self.delivery_type == Some(DeliveryType::Scheduled)
    }

    pub fn is_temp_basal(&self) -> bool {
        self.is_basal() && self.delivery_type == Some(DeliveryType::Temp)
    }
}

/// Basal delivery mode reported by the device.
///
/// Unknown values round-trip unchanged so records this engine does not act
/// on are never corrupted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryType {
    Scheduled,
    Temp,
    TempStop,
    Suspend,
    Resume,
    Other(String),
}

impl DeliveryType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Temp => "temp",
            Self::TempStop => "temp-stop",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for DeliveryType {
    fn from(s: &str) -> Self {
        match s {
            "scheduled" => Self::Scheduled,
            "temp" => Self::Temp,
            "temp-stop" => Self::TempStop,
            "suspend" => Self::Suspend,
            "resume" => Self::Resume,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for DeliveryType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeliveryType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeliveryType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.as_str().into())
    }
}

/// Upload source a record came from.
///
/// The engine only cares about carelink (legacy model without trustworthy
/// durations) and diasend (durations reported directly); everything else is
/// carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Carelink,
    Diasend,
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Carelink => "carelink",
            Self::Diasend => "diasend",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        match s {
            "carelink" => Self::Carelink,
            "diasend" => Self::Diasend,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for Source {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Source {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.as_str().into())
    }
}
