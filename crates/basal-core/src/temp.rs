//! Joins a temporary-rate override with its expiry or cancellation.
//!
//! A temp basal carries its own duration, so its natural end is known the
//! moment it starts. The join exists because the override can be cancelled
//! early: a later `temp-stop` naming the override clips the segment short.
//! Only one override window is tracked at a time; a second temp series
//! interleaved before the first closes is buffered untouched rather than
//! guessed at.

use chrono::Duration;

use crate::error::ReconstructError;
use crate::event::{DeliveryType, DeviceEvent};
use crate::join::{JoinContext, Joiner, Spawn, StepResult};
use crate::segment::{BasalSegment, Record};

pub struct TempJoiner;

impl Joiner for TempJoiner {
    type Context = TempContext;

    fn spawn(&self, record: Record) -> Result<Spawn<TempContext>, ReconstructError> {
        match record {
            Record::Event(event) if !event.is_new_model() && event.is_temp_basal() => {
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
                tracing::trace!(id = %event.id, %start, %end, "temp override opened");
                Ok(Spawn::Open(TempContext {
                    temp: BasalSegment::from_event(&event, start, Some(end)),
                    buffer: Vec::new(),
                }))
            }
            other => Ok(Spawn::Pass(other)),
        }
    }
}

pub struct TempContext {
    temp: BasalSegment,
    buffer: Vec<Record>,
}

impl TempContext {
    fn close(&mut self, reoffer: Option<DeviceEvent>) -> StepResult {
        tracing::trace!(id = %self.temp.id, end = ?self.temp.end, "temp override closed");
        let mut emit = vec![Record::Segment(self.temp.clone())];
        emit.append(&mut self.buffer);
        StepResult::Close { emit, reoffer }
    }

    fn cancels(&self, event: &DeviceEvent) -> bool {
        event.delivery_type == Some(DeliveryType::TempStop)
            && event.temp_id.as_deref() == Some(self.temp.id.as_str())
    }
}

impl JoinContext for TempContext {
    fn handle(&mut self, record: Record) -> Result<StepResult, ReconstructError> {
        let Record::Event(event) = record else {
            self.buffer.push(record);
            return Ok(StepResult::Continue);
        };
        if event.is_new_model() || !event.is_basal() {
            self.buffer.push(Record::Event(event));
            return Ok(StepResult::Continue);
        }

        // Natural expiry is checked before cancellation: a stop that arrives
        // after the window already ran out cannot clip anything.
        let expired = match (self.temp.end, event.device_time) {
            (Some(end), Some(at)) => end < at,
            _ => false,
        };
        if expired {
            return Ok(self.close(Some(event)));
        }

        if self.cancels(&event) {
            let at = event
                .device_time
                .ok_or_else(|| ReconstructError::MissingDeviceTime {
                    id: event.id.clone(),
                })?;
            self.temp.end = Some(at);
            // The cancellation marker is absorbed into the segment.
            return Ok(self.close(None));
        }

        self.buffer.push(Record::Event(event));
        Ok(StepResult::Continue)
    }

    fn completed(self) -> Vec<Record> {
        let mut tail = vec![Record::Segment(self.temp)];
        tail.extend(self.buffer);
        tail
    }
}
