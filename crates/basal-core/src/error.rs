//! Errors raised while reconstructing segments.

use thiserror::Error;

/// Failure modes of the reconstruction pipeline.
///
/// Every variant names the offending record's id so a caller can point back
/// at the upload that produced it. Reconstruction is all-or-nothing: the
/// first malformed record aborts the pass rather than emitting a stream with
/// silent gaps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    /// A legacy basal record that must anchor or clip a segment has no
    /// device-local timestamp.
    #[error("event {id} has no deviceTime, cannot place it on the timeline")]
    MissingDeviceTime { id: String },

    /// A record whose segment end is derived from its duration has none.
    #[error("event {id} has no duration, cannot bound its segment")]
    MissingDuration { id: String },

    /// Two bolus components with the same sub-type arrived for one join key.
    #[error("duplicate bolus component {sub_type} for event {id}")]
    DuplicateBolusComponent { id: String, sub_type: String },

    /// A bolus component arrived for a different join key while another
    /// bolus was still being assembled.
    #[error("event {id} carries joinKey {found}, expected {expected}")]
    MismatchedJoinKey {
        id: String,
        found: String,
        expected: String,
    },
}
