//! Core reconstruction logic for basal segment streams.
//!
//! This crate turns a sorted stream of raw insulin-pump dosing events into
//! continuous basal-rate segments:
//! - Self-join: the generic single-context stream operator the passes share
//! - Scheduled join: carelink legacy rate changes bounded by the next one
//! - Temp join: temporary overrides closed by expiry or cancellation
//! - Direct map: diasend events that already carry their duration
//! - Bolus join: dual-wave bolus halves merged by join key

mod bolus;
mod direct;
mod error;
pub mod event;
pub mod join;
mod pipeline;
mod scheduled;
pub mod segment;
mod temp;

pub use bolus::join_boluses;
pub use direct::map_direct_durations;
pub use error::ReconstructError;
pub use event::{DeliveryType, DeviceEvent, Source};
pub use join::{JoinContext, Joiner, Spawn, StepResult, self_join};
pub use pipeline::{reconstruct, reconstruct_with_boluses};
pub use scheduled::ScheduledJoiner;
pub use segment::{BasalSegment, Record, SegmentTag};
pub use temp::TempJoiner;
