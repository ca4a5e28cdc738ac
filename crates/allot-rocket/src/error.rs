//! Errors of an allocation run

use allot_core::{Allocation, StoreError};
use thiserror::Error;

use crate::repair::RepairJob;

/// Reasons an allocation run failed
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The store failed; nothing of the run has been applied
    #[error("allocation aborted, store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// A selected booking was no longer pending at commit time; nothing of the
    /// run has been applied
    #[error("allocation aborted: {0}")]
    Conflict(#[source] StoreError),

    /// Only part of the writes were applied
    ///
    /// `committed` lists the allocations whose writes all succeeded. `dropped`
    /// lists the allocations whose booking could not be moved out of pending;
    /// nothing of them was written. `repair` lists the writes still missing
    /// for allocated bookings.
    #[error("allocation partially applied, {} grant(s) dropped, {} grant(s) need repair", .dropped.len(), .repair.grants.len())]
    PartialWrite {
        /// Allocations written completely
        committed: Vec<Allocation>,
        /// Allocations not applied at all
        dropped: Vec<Allocation>,
        /// Writes left missing
        repair: RepairJob,
    },
}

impl AllocationError {
    /// Classify an error of an all-or-nothing store operation
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => AllocationError::Conflict(err),
            err => AllocationError::StoreUnavailable(err),
        }
    }
}
