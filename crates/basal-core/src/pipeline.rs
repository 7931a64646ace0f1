//! Composes the reconstruction passes over one ordered event stream.

use crate::bolus::join_boluses;
use crate::direct::map_direct_durations;
use crate::error::ReconstructError;
use crate::event::{DeliveryType, DeviceEvent};
use crate::join::self_join;
use crate::scheduled::ScheduledJoiner;
use crate::segment::Record;
use crate::temp::TempJoiner;

/// Rejects legacy basal events that can never be placed on the timeline.
///
/// Catching these up front means no pass has to worry about a half-built
/// segment when it trips over one mid-stream.
fn check_well_formed(events: &[DeviceEvent]) -> Result<(), ReconstructError> {
    for event in events {
        let joinable = matches!(
            event.delivery_type,
            Some(DeliveryType::Scheduled | DeliveryType::Temp)
        );
        if joinable && !event.is_new_model() && event.device_time.is_none() {
            return Err(ReconstructError::MissingDeviceTime {
                id: event.id.clone(),
            });
        }
    }
    Ok(())
}

/// Reconstructs basal-rate segments from a sorted stream of device events.
///
/// Runs the scheduled join, then the temp-override join, then the direct
/// duration map; each pass consumes the full output of the previous one and
/// passes everything it does not recognize through untouched. The input must
/// already be sorted ascending by `deviceTime` and schema-validated; the
/// first malformed record aborts the whole pass.
pub fn reconstruct(events: Vec<DeviceEvent>) -> Result<Vec<Record>, ReconstructError> {
    check_well_formed(&events)?;
    tracing::debug!(events = events.len(), "reconstructing basal segments");

    let records = events.into_iter().map(Record::Event).collect();
    let records = self_join(records, &ScheduledJoiner)?;
    let records = self_join(records, &TempJoiner)?;
    let records = map_direct_durations(records)?;

    tracing::debug!(records = records.len(), "reconstruction finished");
    Ok(records)
}

/// Reconstructs segments and additionally merges dual-wave bolus halves.
pub fn reconstruct_with_boluses(
    events: Vec<DeviceEvent>,
) -> Result<Vec<Record>, ReconstructError> {
    join_boluses(reconstruct(events)?)
}
