//! Joins the two halves of a dual-wave bolus into one record.
//!
//! Pumps report a dual-wave bolus as two events, an immediate `dual/normal`
//! delivery and an extended `dual/square` delivery, tied together by a join
//! key. The merged record keeps the first component's identity, sums the
//! delivered values, and takes the extended component's duration.

use serde_json::Value;

use crate::error::ReconstructError;
use crate::event::DeviceEvent;
use crate::join::{self_join, JoinContext, Joiner, Spawn, StepResult};
use crate::segment::Record;

const NORMAL: &str = "dual/normal";
const SQUARE: &str = "dual/square";

/// Join key of a dual-wave component. Newer uploads call it `joinKey`,
/// legacy carelink exports `groupId`.
fn join_key(event: &DeviceEvent) -> Option<&str> {
    event
        .extra
        .get("joinKey")
        .or_else(|| event.extra.get("groupId"))
        .and_then(Value::as_str)
}

fn dual_component(event: &DeviceEvent) -> Option<&str> {
    if event.event_type != "bolus" {
        return None;
    }
    match event.sub_type.as_deref() {
        Some(sub @ (NORMAL | SQUARE)) => Some(sub),
        _ => None,
    }
}

fn delivered_value(event: &DeviceEvent) -> f64 {
    match event.extra.get("value").and_then(Value::as_f64) {
        Some(value) => value,
        None => {
            tracing::warn!(id = %event.id, "bolus component has no numeric value");
            0.0
        }
    }
}

/// Runs the dual-wave join over the whole stream.
pub fn join_boluses(records: Vec<Record>) -> Result<Vec<Record>, ReconstructError> {
    self_join(records, &BolusJoiner)
}

pub struct BolusJoiner;

impl Joiner for BolusJoiner {
    type Context = BolusContext;

    fn spawn(&self, record: Record) -> Result<Spawn<BolusContext>, ReconstructError> {
        match record {
            Record::Event(event) if dual_component(&event).is_some() => {
                match join_key(&event).map(str::to_string) {
                    Some(key) => {
                        tracing::trace!(id = %event.id, key = %key, "dual-wave bolus opened");
                        Ok(Spawn::Open(BolusContext {
                            key,
                            first: event,
                            second: None,
                            buffer: Vec::new(),
                        }))
                    }
                    // A component with no join key has nothing to pair with.
                    None => Ok(Spawn::Pass(Record::Event(event))),
                }
            }
            other => Ok(Spawn::Pass(other)),
        }
    }
}

pub struct BolusContext {
    key: String,
    first: DeviceEvent,
    second: Option<DeviceEvent>,
    buffer: Vec<Record>,
}

impl BolusContext {
    fn merge(&mut self) -> DeviceEvent {
        let Some(second) = self.second.take() else {
            // merge is only called with both halves present
            return self.first.clone();
        };
        let (normal, square) = if self.first.sub_type.as_deref() == Some(NORMAL) {
            (&self.first, &second)
        } else {
            (&second, &self.first)
        };

        let initial = delivered_value(normal);
        let extended = delivered_value(square);

        let mut merged = self.first.clone();
        merged.sub_type = None;
        merged.duration = square.duration;
        merged.extra.remove("joinKey");
        merged.extra.remove("groupId");
        merged
            .extra
            .insert("value".to_string(), Value::from(initial + extended));
        merged.extra.insert("extended".to_string(), Value::Bool(true));
        merged
            .extra
            .insert("initialDelivery".to_string(), Value::from(initial));
        merged
            .extra
            .insert("extendedDelivery".to_string(), Value::from(extended));
        merged
    }
}

impl JoinContext for BolusContext {
    fn handle(&mut self, record: Record) -> Result<StepResult, ReconstructError> {
        let event = match record {
            Record::Event(event) if dual_component(&event).is_some() => event,
            other => {
                self.buffer.push(other);
                return Ok(StepResult::Continue);
            }
        };

        match join_key(&event).map(str::to_string) {
            Some(key) if key == self.key => {}
            Some(key) => {
                return Err(ReconstructError::MismatchedJoinKey {
                    id: event.id,
                    found: key,
                    expected: self.key.clone(),
                });
            }
            None => {
                self.buffer.push(Record::Event(event));
                return Ok(StepResult::Continue);
            }
        }

        if event.sub_type == self.first.sub_type {
            return Err(ReconstructError::DuplicateBolusComponent {
                id: event.id,
                sub_type: event.sub_type.unwrap_or_default(),
            });
        }

        self.second = Some(event);
        let merged = self.merge();
        tracing::trace!(id = %merged.id, "dual-wave bolus merged");

        let mut emit = vec![Record::Event(merged)];
        emit.append(&mut self.buffer);
        Ok(StepResult::Close {
            emit,
            reoffer: None,
        })
    }

    fn completed(self) -> Vec<Record> {
        // A lone component at stream end passes through untouched.
        let mut tail = vec![Record::Event(self.first)];
        tail.extend(self.buffer);
        tail
    }
}
