//! Generic single-pass self-join over an ordered record stream.
//!
//! A joiner watches the stream for an event that opens a *context* (an
//! in-progress segment). While a context is open every subsequent record is
//! handed to it, and the context decides whether to keep tracking or to
//! close and flush. At most one context is open at a time, which the
//! [`JoinState`] enum makes unrepresentable rather than merely unlikely.

use crate::error::ReconstructError;
use crate::event::DeviceEvent;
use crate::segment::Record;

/// Outcome of offering a record to a joiner with no open context.
pub enum Spawn<C> {
    /// The record opened a new context.
    Open(C),
    /// The record is not a trigger; emit it unchanged.
    Pass(Record),
}

/// Outcome of handing a record to an open context.
pub enum StepResult {
    /// The context absorbed or buffered the record and stays open.
    Continue,
    /// The context closed. `emit` is flushed to the output verbatim;
    /// `reoffer`, when present, is the closing trigger and gets one chance
    /// to open the next context before being emitted.
    Close {
        emit: Vec<Record>,
        reoffer: Option<DeviceEvent>,
    },
}

/// Opens contexts for one family of joinable events.
pub trait Joiner {
    type Context: JoinContext;

    /// Decides whether `record` opens a context.
    fn spawn(&self, record: Record) -> Result<Spawn<Self::Context>, ReconstructError>;
}

/// An in-progress segment being assembled from the stream.
pub trait JoinContext {
    /// Feeds the next record to the context.
    fn handle(&mut self, record: Record) -> Result<StepResult, ReconstructError>;

    /// Flushes the context when the stream ends while it is still open.
    fn completed(self) -> Vec<Record>;
}

enum JoinState<C> {
    Idle,
    Tracking(C),
}

/// Runs one joiner over the whole stream.
///
/// Input must be sorted by device time; the reconstruction contract places
/// that burden on the caller, so violations are a programming error here.
pub fn self_join<J: Joiner>(
    records: Vec<Record>,
    joiner: &J,
) -> Result<Vec<Record>, ReconstructError> {
    debug_assert_sorted(&records);

    let mut output = Vec::with_capacity(records.len());
    let mut state = JoinState::Idle;

    for record in records {
        state = match state {
            JoinState::Idle => offer(joiner, record, &mut output)?,
            JoinState::Tracking(mut context) => match context.handle(record)? {
                StepResult::Continue => JoinState::Tracking(context),
                StepResult::Close { emit, reoffer } => {
                    tracing::trace!(flushed = emit.len(), "context closed");
                    output.extend(emit);
                    match reoffer {
                        Some(event) => offer(joiner, Record::Event(event), &mut output)?,
                        None => JoinState::Idle,
                    }
                }
            },
        };
    }

    if let JoinState::Tracking(context) = state {
        let tail = context.completed();
        tracing::trace!(flushed = tail.len(), "context open at stream end");
        output.extend(tail);
    }

    Ok(output)
}

fn offer<J: Joiner>(
    joiner: &J,
    record: Record,
    output: &mut Vec<Record>,
) -> Result<JoinState<J::Context>, ReconstructError> {
    match joiner.spawn(record)? {
        Spawn::Open(context) => Ok(JoinState::Tracking(context)),
        Spawn::Pass(record) => {
            output.push(record);
            Ok(JoinState::Idle)
        }
    }
}

fn debug_assert_sorted(records: &[Record]) {
    if cfg!(debug_assertions) {
        let mut previous = None;
        for record in records {
            if let Some(time) = record.device_time() {
                if let Some(prev) = previous {
                    debug_assert!(prev <= time, "records not sorted by deviceTime");
                }
                previous = Some(time);
            }
        }
    }
}
