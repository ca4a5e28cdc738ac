//! Implementation of the coordinator
use std::collections::{HashMap, HashSet};
use std::slice;
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use allot_core::{
    Allocation, Booking, BookingFilter, BookingId, BookingPolicy, BookingStatus, Candidate,
    SpotId, Store, StoreError, StoreResult, UserId, WriteSet,
};
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::error::AllocationError;
use crate::repair::{GrantRepair, MissingWrites, RepairJob};
use crate::selector::select;

/// State owned by the run currently executing
struct RunState {
    /// Random source for breaking ties in the boundary group
    rng: Box<dyn RngCore + Send>,
}

/// Coordinator executing allocation runs against a [`Store`]
///
/// Runs and reconciliation passes are serialized: at most one of them touches
/// the store at any time.
pub struct Coordinator {
    store: Arc<dyn Store>,
    policy: BookingPolicy,
    run: Mutex<RunState>,

    /// Channel through which incomplete runs hand their repair jobs to the
    /// reconciler
    repair_sender: Option<Sender<RepairJob>>,
}

impl Coordinator {
    /// Create the [`Coordinator`] with an entropy-seeded random source
    pub fn new(store: Arc<dyn Store>, policy: BookingPolicy) -> Self {
        Self::with_rng(store, policy, StdRng::from_entropy())
    }

    /// Create the [`Coordinator`] with the given random source
    pub fn with_rng(
        store: Arc<dyn Store>,
        policy: BookingPolicy,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            store,
            policy,
            run: Mutex::new(RunState { rng: Box::new(rng) }),
            repair_sender: None,
        }
    }

    /// Forward repair jobs of partially applied runs to `sender`
    pub fn with_repair_sender(mut self, sender: Sender<RepairJob>) -> Self {
        self.repair_sender = Some(sender);
        self
    }

    /// Get the booking policy
    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    /// Execute one allocation run handing out up to `capacity` spots
    ///
    /// Pending bookings are ranked by the tokens their users have used so far,
    /// spots `Spot 1 ..` are assigned in fetch order and the resulting status
    /// transitions, token increments and allocation records are written.
    pub fn run(&self, capacity: u32) -> Result<Vec<Allocation>, AllocationError> {
        let mut state = self.run.lock();
        let started = Instant::now();

        if capacity == 0 {
            info!("capacity is zero, nothing to allocate");
            return Ok(Vec::new());
        }

        let pending = self
            .store
            .find_bookings(&BookingFilter::PENDING)
            .map_err(AllocationError::StoreUnavailable)?;
        if pending.is_empty() {
            info!(capacity, "no pending bookings");
            return Ok(Vec::new());
        }

        let eligible = self.eligible(&pending);
        let weights = self.load_weights(&eligible)?;

        let mut candidates: Vec<Candidate<BookingId>> = eligible
            .iter()
            .map(|b| Candidate::new(b.id, weights.get(&b.user).copied().unwrap_or(0)))
            .collect();
        let selected: HashSet<BookingId> =
            select(&mut candidates, capacity as usize, &mut *state.rng)
                .into_iter()
                .collect();

        let allocations: Vec<Allocation> = eligible
            .iter()
            .filter(|b| selected.contains(&b.id))
            .zip(1..)
            .map(|(b, spot)| Allocation {
                user: b.user.clone(),
                spot: SpotId(spot),
                booking: b.id,
            })
            .collect();

        for candidate in candidates.iter().filter(|c| selected.contains(&c.id)) {
            debug!(booking = %candidate.id, tokens = candidate.weight, "granted");
        }

        self.persist(&allocations)?;

        info!(
            capacity,
            pending = pending.len(),
            eligible = eligible.len(),
            allocated = allocations.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "allocation run completed"
        );
        Ok(allocations)
    }

    /// Retry the missing writes of `job`
    ///
    /// Returns the writes that are still missing afterwards.
    pub fn reconcile(&self, job: RepairJob) -> RepairJob {
        let _state = self.run.lock();

        let grants: Vec<GrantRepair> = job
            .grants
            .into_iter()
            .filter_map(|mut grant| {
                let allocation = &grant.allocation;

                if grant.missing.tokens {
                    match self.store.increment_tokens(slice::from_ref(&allocation.user)) {
                        Ok(()) => grant.missing.tokens = false,
                        Err(err) => warn!(user = %allocation.user, %err, "token repair failed"),
                    }
                }

                if grant.missing.record {
                    match self.store.insert_allocations(slice::from_ref(allocation)) {
                        Ok(()) => grant.missing.record = false,
                        Err(err) => {
                            warn!(booking = %allocation.booking, %err, "record repair failed")
                        }
                    }
                }

                (!grant.missing.is_complete()).then_some(grant)
            })
            .collect();

        RepairJob { grants }
    }

    /// Pending bookings taking part in the selection, in fetch order
    fn eligible<'a>(&self, pending: &'a [Booking]) -> Vec<&'a Booking> {
        match self.policy {
            BookingPolicy::PerBooking => pending.iter().collect(),
            BookingPolicy::OnePerUser => {
                let mut seen = HashSet::with_capacity(pending.len());
                pending.iter().filter(|b| seen.insert(&b.user)).collect()
            }
        }
    }

    /// Look up the tokens used by the users of `bookings`
    fn load_weights(&self, bookings: &[&Booking]) -> Result<HashMap<UserId, u32>, AllocationError> {
        let mut seen = HashSet::with_capacity(bookings.len());
        let users: Vec<UserId> = bookings
            .iter()
            .filter(|b| seen.insert(&b.user))
            .map(|b| b.user.clone())
            .collect();

        let records = self
            .store
            .find_users(&users)
            .map_err(AllocationError::StoreUnavailable)?;
        Ok(records
            .into_iter()
            .map(|record| (record.user, record.used_tokens))
            .collect())
    }

    /// Write the outcome of a run
    fn persist(&self, allocations: &[Allocation]) -> Result<(), AllocationError> {
        if allocations.is_empty() {
            return Ok(());
        }

        if self.store.supports_atomic_commit() {
            return self
                .store
                .commit(&WriteSet::for_allocations(allocations))
                .map_err(|err| {
                    error!(%err, "commit failed, nothing applied");
                    AllocationError::from_store(err)
                });
        }

        let outcome = self.write_individually(allocations);
        if outcome.granted.is_empty() {
            return Err(match outcome.first_error {
                Some(err @ StoreError::Conflict { .. }) => {
                    error!(%err, "no booking was still pending, nothing applied");
                    AllocationError::Conflict(err)
                }
                err => {
                    let err = err.unwrap_or(StoreError::Unavailable("write failed".into()));
                    error!(%err, "every status update failed, nothing applied");
                    AllocationError::StoreUnavailable(err)
                }
            });
        }

        let (committed, incomplete): (Vec<GrantRepair>, Vec<GrantRepair>) = outcome
            .granted
            .into_iter()
            .partition(|grant| grant.missing.is_complete());
        if incomplete.is_empty() && outcome.dropped.is_empty() {
            return Ok(());
        }

        for allocation in &outcome.dropped {
            warn!(
                booking = %allocation.booking,
                user = %allocation.user,
                "grant dropped, booking left untouched"
            );
        }
        let repair = RepairJob { grants: incomplete };
        for grant in &repair.grants {
            warn!(
                booking = %grant.allocation.booking,
                user = %grant.allocation.user,
                missing_tokens = grant.missing.tokens,
                missing_record = grant.missing.record,
                "grant written partially"
            );
        }
        if let Some(sender) = self.repair_sender.as_ref().filter(|_| !repair.is_empty()) {
            if sender.send(repair.clone()).is_err() {
                error!(
                    grants = repair.grants.len(),
                    "reconciler is gone, repair job not queued"
                );
            }
        }

        Err(AllocationError::PartialWrite {
            committed: committed.into_iter().map(|g| g.allocation).collect(),
            dropped: outcome.dropped,
            repair,
        })
    }

    /// Issue the writes one by one for stores without atomic commit
    ///
    /// The conditional status update gates every grant: token increments and
    /// allocation records are only written for bookings that moved from
    /// pending to allocated. These two groups touch disjoint collections and
    /// are issued concurrently.
    fn write_individually(&self, allocations: &[Allocation]) -> WriteOutcome {
        let store = &*self.store;
        let mut first_error = None;
        let mut dropped = Vec::new();

        let mut granted: Vec<&Allocation> = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            match store.update_booking_status(
                &allocation.booking,
                BookingStatus::Pending,
                BookingStatus::Allocated,
            ) {
                Ok(()) => granted.push(allocation),
                Err(err) => {
                    debug!(booking = %allocation.booking, %err, "status update failed");
                    first_error.get_or_insert(err);
                    dropped.push(allocation.clone());
                }
            }
        }

        let n = granted.len();
        let (tokens, records) = thread::scope(|s| {
            let tokens = s.spawn(|| {
                granted
                    .iter()
                    .map(|a| store.increment_tokens(slice::from_ref(&a.user)))
                    .collect::<Vec<_>>()
            });
            let records = s.spawn(|| {
                granted
                    .iter()
                    .map(|a| store.insert_allocations(slice::from_ref(*a)))
                    .collect::<Vec<_>>()
            });
            (join_writes(tokens, n), join_writes(records, n))
        });

        let granted = granted
            .into_iter()
            .zip(tokens)
            .zip(records)
            .map(|((allocation, tokens), record)| {
                let missing = MissingWrites {
                    tokens: tokens.is_err(),
                    record: record.is_err(),
                };
                for err in [tokens, record].into_iter().filter_map(Result::err) {
                    first_error.get_or_insert(err);
                }
                GrantRepair {
                    allocation: allocation.clone(),
                    missing,
                }
            })
            .collect();

        WriteOutcome {
            granted,
            dropped,
            first_error,
        }
    }
}

/// Result of issuing the writes of a run one by one
struct WriteOutcome {
    /// Grants whose booking is allocated, with the writes still missing
    granted: Vec<GrantRepair>,
    /// Grants whose status update failed; nothing of them was written
    dropped: Vec<Allocation>,
    first_error: Option<StoreError>,
}

/// Collect the results of a writer thread, counting a panic as `n` failures
fn join_writes(
    handle: ScopedJoinHandle<'_, Vec<StoreResult<()>>>,
    n: usize,
) -> Vec<StoreResult<()>> {
    handle.join().unwrap_or_else(|_| {
        vec![Err(StoreError::Unavailable("writer thread panicked".into())); n]
    })
}
