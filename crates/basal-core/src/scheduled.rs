//! Joins consecutive carelink scheduled-basal events into rate segments.
//!
//! The carelink legacy model reports basal state as "this rate started at T"
//! events with no trustworthy duration, so a segment's end is definitionally
//! the start of the next scheduled event from the *same* device. Foreign
//! devices and unrelated records are buffered and must never fake a
//! boundary.

use chrono::{Duration, NaiveDateTime};

use crate::error::ReconstructError;
use crate::event::{DeviceEvent, Source};
use crate::join::{JoinContext, Joiner, Spawn, StepResult};
use crate::segment::{BasalSegment, Record};

/// True for legacy (no absolute `time`) carelink scheduled-basal events,
/// the only shape that can open or close a scheduled segment.
fn is_legacy_carelink_scheduled(event: &DeviceEvent) -> bool {
    event.source == Some(Source::Carelink) && !event.is_new_model() && event.is_scheduled_basal()
}

pub struct ScheduledJoiner;

impl Joiner for ScheduledJoiner {
    type Context = ScheduledContext;

    fn spawn(&self, record: Record) -> Result<Spawn<ScheduledContext>, ReconstructError> {
        match record {
            Record::Event(event) if is_legacy_carelink_scheduled(&event) => {
                let start = event.device_time.ok_or_else(|| {
                    ReconstructError::MissingDeviceTime {
                        id: event.id.clone(),
                    }
                })?;
                tracing::trace!(id = %event.id, %start, "scheduled segment opened");
                Ok(Spawn::Open(ScheduledContext {
                    start,
                    opener: event,
                    buffer: Vec::new(),
                }))
            }
            other => Ok(Spawn::Pass(other)),
        }
    }
}

pub struct ScheduledContext {
    start: NaiveDateTime,
    opener: DeviceEvent,
    buffer: Vec<Record>,
}

impl ScheduledContext {
    fn closes_segment(&self, event: &DeviceEvent) -> bool {
        is_legacy_carelink_scheduled(event) && event.device_id == self.opener.device_id
    }

    /// Segment end at closure: the opener's own duration wins when the
    /// device reported one, otherwise the boundary is the trigger's start.
    fn end_at(&self, trigger: &DeviceEvent) -> Result<NaiveDateTime, ReconstructError> {
        if let Some(duration) = self.opener.duration {
            return Ok(self.start + Duration::milliseconds(duration));
        }
        trigger
            .device_time
            .ok_or_else(|| ReconstructError::MissingDeviceTime {
                id: trigger.id.clone(),
            })
    }
}

impl JoinContext for ScheduledContext {
    fn handle(&mut self, record: Record) -> Result<StepResult, ReconstructError> {
        match record {
            Record::Event(event) if self.closes_segment(&event) => {
                let end = self.end_at(&event)?;
                let segment = BasalSegment::from_event(&self.opener, self.start, Some(end));
                tracing::trace!(id = %segment.id, %end, "scheduled segment closed");

                let mut emit = vec![Record::Segment(segment)];
                emit.append(&mut self.buffer);
                Ok(StepResult::Close {
                    emit,
                    reoffer: Some(event),
                })
            }
            other => {
                self.buffer.push(other);
                Ok(StepResult::Continue)
            }
        }
    }

    fn completed(self) -> Vec<Record> {
        let segment = BasalSegment::from_event(&self.opener, self.start, None);
        let mut tail = vec![Record::Segment(segment)];
        tail.extend(self.buffer);
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::self_join;

    fn ts(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn scheduled(id: &str, device_id: &str, device_time: &str) -> DeviceEvent {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "type": "basal",
            "deliveryType": "scheduled",
            "source": "carelink",
            "deviceId": device_id,
            "deviceTime": device_time,
            "value": 0.65,
        }))
        .unwrap()
    }

    fn run(events: Vec<DeviceEvent>) -> Vec<Record> {
        let records = events.into_iter().map(Record::Event).collect();
        self_join(records, &ScheduledJoiner).unwrap()
    }

    fn as_segment(record: &Record) -> &BasalSegment {
        match record {
            Record::Segment(segment) => segment,
            Record::Event(event) => panic!("expected segment, got event {}", event.id),
        }
    }

    #[test]
    fn chain_of_same_device_events_yields_half_open_segments() {
        let output = run(vec![
            scheduled("a", "pump-1", "2014-03-07T01:00:00"),
            scheduled("b", "pump-1", "2014-03-07T04:00:00"),
            scheduled("c", "pump-1", "2014-03-07T12:00:00"),
        ]);

        assert_eq!(output.len(), 3);

        let first = as_segment(&output[0]);
        assert_eq!(first.start, ts("2014-03-07T01:00:00"));
        assert_eq!(first.end, Some(ts("2014-03-07T04:00:00")));

        let second = as_segment(&output[1]);
        assert_eq!(second.start, ts("2014-03-07T04:00:00"));
        assert_eq!(second.end, Some(ts("2014-03-07T12:00:00")));

        let last = as_segment(&output[2]);
        assert_eq!(last.start, ts("2014-03-07T12:00:00"));
        assert_eq!(last.end, None);
    }

    #[test]
    fn foreign_device_event_cannot_close_the_segment() {
        let output = run(vec![
            scheduled("a", "pump-1", "2014-03-07T01:00:00"),
            scheduled("other", "pump-2", "2014-03-07T02:00:00"),
            scheduled("b", "pump-1", "2014-03-07T04:00:00"),
        ]);

        let first = as_segment(&output[0]);
        assert_eq!(first.end, Some(ts("2014-03-07T04:00:00")));

        // The foreign event rides along unmodified, in its original position.
        assert_eq!(
            output[1],
            Record::Event(scheduled("other", "pump-2", "2014-03-07T02:00:00"))
        );

        let last = as_segment(&output[2]);
        assert_eq!(last.start, ts("2014-03-07T04:00:00"));
        assert_eq!(last.end, None);
    }

    #[test]
    fn opener_duration_overrides_trigger_boundary() {
        let mut opener = scheduled("a", "pump-1", "2014-03-07T01:00:00");
        opener.duration = Some(3_600_000);

        let output = run(vec![opener, scheduled("b", "pump-1", "2014-03-07T04:00:00")]);

        let first = as_segment(&output[0]);
        assert_eq!(first.end, Some(ts("2014-03-07T02:00:00")));
    }

    #[test]
    fn non_carelink_scheduled_events_pass_through() {
        let mut event = scheduled("a", "pump-1", "2014-03-07T01:00:00");
        event.source = Some(Source::from("demo"));

        let output = run(vec![event.clone()]);
        assert_eq!(output, vec![Record::Event(event)]);
    }

    #[test]
    fn new_model_events_never_open_or_close() {
        let mut new_model = scheduled("n", "pump-1", "2014-03-07T02:00:00");
        new_model.time = Some("2014-03-07T10:00:00Z".parse().unwrap());

        let output = run(vec![
            scheduled("a", "pump-1", "2014-03-07T01:00:00"),
            new_model.clone(),
            scheduled("b", "pump-1", "2014-03-07T04:00:00"),
        ]);

        let first = as_segment(&output[0]);
        assert_eq!(first.end, Some(ts("2014-03-07T04:00:00")));
        assert_eq!(output[1], Record::Event(new_model));
    }

    #[test]
    fn spawn_without_device_time_is_rejected() {
        let mut event = scheduled("a", "pump-1", "2014-03-07T01:00:00");
        event.device_time = None;

        let records = vec![Record::Event(event)];
        let err = self_join(records, &ScheduledJoiner).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::MissingDeviceTime {
                id: "a".to_string()
            }
        );
    }
}
