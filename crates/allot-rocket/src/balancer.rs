//! Implementation of the request balancer
use std::sync::Arc;
use std::thread::JoinHandle;

use allot_core::{Request, RequestHandler, RequestKind};
use crossbeam::channel::{bounded, Sender};
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::AllocationError;
use crate::reconciler::ReconcilerCommand;

/// Message sent when a run completed
pub const ALLOCATED_MESSAGE: &str = "Parking allocated successfully";
/// Message sent when a run failed
pub const FAILED_MESSAGE: &str = "Error allocating parking";

/// Entry point for requests to the allotment
///
/// Allocation requests may arrive on many threads at once; the
/// [`Coordinator`] executes them one after another.
pub struct Balancer {
    coordinator: Arc<Coordinator>,
    /// Spots handed out per run unless the request overrides it
    spots: u32,
    reconciler: Sender<ReconcilerCommand>,
    reconciler_thread: JoinHandle<()>,
}

impl Balancer {
    /// Create a new [`Balancer`]
    pub fn new(
        coordinator: Arc<Coordinator>,
        spots: u32,
        reconciler: Sender<ReconcilerCommand>,
        reconciler_thread: JoinHandle<()>,
    ) -> Self {
        Self {
            coordinator,
            spots,
            reconciler,
            reconciler_thread,
        }
    }

    /// Ask the reconciler for an immediate pass
    fn flush_reconciler(&self) -> Option<u32> {
        let (reply, outstanding) = bounded(1);
        self.reconciler
            .send(ReconcilerCommand::Flush { reply })
            .ok()?;
        outstanding.recv().ok()
    }
}

impl RequestHandler for Balancer {
    fn handle(&self, mut rq: Request) {
        match *rq.kind() {
            RequestKind::Allocate => {
                let capacity = rq.read_u32().unwrap_or(self.spots);
                match self.coordinator.run(capacity) {
                    Ok(allocations) => {
                        info!(request = %rq.id(), allocated = allocations.len(), "allocation request served");
                        rq.respond_with_allocations(ALLOCATED_MESSAGE, &allocations);
                    }
                    Err(AllocationError::PartialWrite {
                        committed,
                        dropped,
                        repair,
                    }) => {
                        warn!(
                            request = %rq.id(),
                            committed = committed.len(),
                            dropped = dropped.len(),
                            incomplete = repair.grants.len(),
                            "allocation partially applied"
                        );
                        rq.respond_with_err(FAILED_MESSAGE);
                    }
                    Err(err) => {
                        error!(request = %rq.id(), %err, "allocation failed");
                        rq.respond_with_err(FAILED_MESSAGE);
                    }
                }
            }
            RequestKind::Reconcile => match self.flush_reconciler() {
                Some(outstanding) => rq.respond_with_int(outstanding),
                None => {
                    error!(request = %rq.id(), "reconciler is not running");
                    rq.respond_with_err("Reconciler is not running");
                }
            },
            RequestKind::Debug => {
                let msg = format!(
                    "{} spots per run, policy {}",
                    self.spots,
                    self.coordinator.policy()
                );
                rq.respond_with_string(msg);
            }
        }
    }

    fn shutdown(self) {
        // tell the reconciler to shut down
        let _ = self.reconciler.send(ReconcilerCommand::Shutdown);
        if self.reconciler_thread.join().is_err() {
            error!("reconciler thread panicked");
        }
    }
}
