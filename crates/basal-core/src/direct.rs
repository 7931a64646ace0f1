//! Maps diasend basal events straight to segments.
//!
//! Diasend already reports a duration per basal record, so no joining is
//! needed; each event becomes one segment with no cross-event dependency.

use chrono::Duration;

use crate::error::ReconstructError;
use crate::event::{DeviceEvent, Source};
use crate::segment::{BasalSegment, Record};

fn maps_directly(event: &DeviceEvent) -> bool {
    event.is_basal() && event.source == Some(Source::Diasend) && !event.is_new_model()
}

/// Rewrites every diasend basal event as a closed segment, passing
/// everything else through unchanged.
pub fn map_direct_durations(records: Vec<Record>) -> Result<Vec<Record>, ReconstructError> {
    records
        .into_iter()
        .map(|record| match record {
            Record::Event(event) if maps_directly(&event) => {
                let start = event.device_time.ok_or_else(|| {
                    ReconstructError::MissingDeviceTime {
                        id: event.id.clone(),
                    }
                })?;
                let duration =
                    event
                        .duration
                        .ok_or_else(|| ReconstructError::MissingDuration {
                            id: event.id.clone(),
                        })?;
                let end = start + Duration::milliseconds(duration);
                Ok(Record::Segment(BasalSegment::from_event(
                    &event,
                    start,
                    Some(end),
                )))
            }
            other => Ok(other),
        })
        .collect()
}
