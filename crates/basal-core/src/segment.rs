//! Reconstructed basal segments and the heterogeneous output stream.

use chrono::NaiveDateTime;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::event::{DeliveryType, DeviceEvent, Source};

/// Wire marker for the segment record type.
///
/// Serializes as exactly `"basal-rate-segment"` and refuses anything else on
/// the way in, which is what lets [`Record`] stay untagged: a JSON object is
/// a segment if and only if its `type` field carries this literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentTag;

impl SegmentTag {
    pub const LITERAL: &'static str = "basal-rate-segment";
}

impl Serialize for SegmentTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(Self::LITERAL)
    }
}

impl<'de> Deserialize<'de> for SegmentTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == Self::LITERAL {
            Ok(Self)
        } else {
            Err(D::Error::custom(format!(
                "expected \"{}\", got \"{s}\"",
                Self::LITERAL
            )))
        }
    }
}

/// A continuous basal delivery interval reconstructed from raw events.
///
/// Carries the opening event's fields forward so downstream consumers can
/// still see which record the segment came from. `end` is always serialized;
/// an explicit `null` means the segment was still open when the stream ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasalSegment {
    #[serde(rename = "type")]
    pub tag: SegmentTag,

    /// Id of the event that opened this segment.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_type: Option<DeliveryType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Device-local timestamp of the opening event, retained verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_time: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_id: Option<String>,

    /// Inclusive start of delivery at this rate.
    pub start: NaiveDateTime,

    /// Exclusive end of delivery, or `None` while the segment is open.
    pub end: Option<NaiveDateTime>,

    /// Fields carried over from the opening event (value, scheduleName, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BasalSegment {
    /// Builds a segment over `[start, end)` from the event that opened it.
    pub fn from_event(event: &DeviceEvent, start: NaiveDateTime, end: Option<NaiveDateTime>) -> Self {
        Self {
            tag: SegmentTag,
            id: event.id.clone(),
            delivery_type: event.delivery_type.clone(),
            source: event.source.clone(),
            device_id: event.device_id.clone(),
            device_time: event.device_time,
            duration: event.duration,
            temp_id: event.temp_id.clone(),
            start,
            end,
            extra: event.extra.clone(),
        }
    }
}

/// One element of the reconstruction stream.
///
/// The engine interleaves segments it built with events it passed through, so
/// downstream stages (and the output writer) see a single ordered stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Segment(BasalSegment),
    Event(DeviceEvent),
}

impl Record {
    /// Device-local timestamp used for ordering decisions.
    pub fn device_time(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Segment(segment) => segment.device_time,
            Self::Event(event) => event.device_time,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Segment(segment) => &segment.id,
            Self::Event(event) => &event.id,
        }
    }

    pub fn as_event(&self) -> Option<&DeviceEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Segment(_) => None,
        }
    }
}

impl From<DeviceEvent> for Record {
    fn from(event: DeviceEvent) -> Self {
        Self::Event(event)
    }
}

impl From<BasalSegment> for Record {
    fn from(segment: BasalSegment) -> Self {
        Self::Segment(segment)
    }
}
