// ── Drift reporter ──
//
// Sorts a failed store call into the three classes callers act on.
// Only `NotFound` is absorbed by the reconciler (as a `Missing` state);
// the other two are surfaced, and the split only tells an outer layer
// whether re-running the pass could help.

use strum::Display;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DriftClass {
    NotFound,
    TransientFailure,
    PermanentFailure,
}

pub fn classify(err: &StoreError) -> DriftClass {
    match err {
        StoreError::NotFound { .. } => DriftClass::NotFound,
        StoreError::Timeout | StoreError::Unavailable { .. } => DriftClass::TransientFailure,
        StoreError::Rejected { .. }
        | StoreError::Unauthorized
        | StoreError::Decode(_)
        | StoreError::Unsupported(_) => DriftClass::PermanentFailure,
    }
}
