//! Bookkeeping for writes left missing by a partially applied run

use allot_core::Allocation;

/// Writes of a single grant that have not been applied
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct MissingWrites {
    /// The user's token counter has not been incremented
    pub tokens: bool,
    /// The allocation record has not been inserted
    pub record: bool,
}

impl MissingWrites {
    /// Nothing is missing
    pub fn is_complete(&self) -> bool {
        !(self.tokens || self.record)
    }
}

/// A grant whose writes are incomplete
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GrantRepair {
    /// The allocation the run decided on
    pub allocation: Allocation,
    /// What still has to be written
    pub missing: MissingWrites,
}

/// Writes to retry so that the store agrees with a run's selection
///
/// Only grants whose booking is already allocated are listed, so retrying
/// never allocates a booking twice.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct RepairJob {
    /// The incomplete grants
    pub grants: Vec<GrantRepair>,
}

impl RepairJob {
    /// Whether all writes have been applied
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
