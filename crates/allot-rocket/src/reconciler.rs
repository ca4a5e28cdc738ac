//! Implementation of the reconciler

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use crossbeam::select;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::repair::RepairJob;

/// Commands the balancer sends to the reconciler
pub enum ReconcilerCommand {
    /// Reconcile right away and report the number of jobs still outstanding
    Flush { reply: Sender<u32> },
    /// Terminate the reconciler loop
    Shutdown,
}

/// Background worker completing the writes of partially applied runs
pub struct Reconciler {
    coordinator: Arc<Coordinator>,

    /// Number of seconds between two passes
    interval_secs: u32,

    /// Jobs still waiting for their writes
    jobs: Vec<RepairJob>,

    /// Receiver for repair jobs produced by the coordinator
    repair_receiver: Receiver<RepairJob>,

    /// Receiver for flush and shutdown commands
    command_receiver: Receiver<ReconcilerCommand>,
}

impl Reconciler {
    /// Create a new [`Reconciler`]
    pub fn new(
        coordinator: Arc<Coordinator>,
        interval_secs: u32,
        repair_receiver: Receiver<RepairJob>,
        command_receiver: Receiver<ReconcilerCommand>,
    ) -> Self {
        Self {
            coordinator,
            interval_secs,
            jobs: Vec::new(),
            repair_receiver,
            command_receiver,
        }
    }

    /// Main reconciler loop
    pub fn run(&mut self) {
        let interval = Duration::from_secs(self.interval_secs.max(1) as u64);
        let commands = self.command_receiver.clone();
        loop {
            let stop = select! {
                recv(commands) -> msg => match msg {
                    Ok(ReconcilerCommand::Flush { reply }) => {
                        let outstanding = self.pass();
                        let _ = reply.send(outstanding);
                        false
                    }
                    // Shutdown, or the balancer is gone
                    Ok(ReconcilerCommand::Shutdown) | Err(_) => true,
                },
                default(interval) => {
                    self.pass();
                    false
                }
            };
            if stop {
                break;
            }
        }

        if !self.jobs.is_empty() {
            warn!(
                outstanding = self.jobs.len(),
                "reconciler stopped with incomplete repair jobs"
            );
        }
    }

    /// Retry all known jobs once, returning the number still incomplete
    pub fn pass(&mut self) -> u32 {
        // Pick up jobs from runs that finished in the meantime
        while let Ok(job) = self.repair_receiver.try_recv() {
            self.jobs.push(job);
        }
        if self.jobs.is_empty() {
            return 0;
        }

        let before = self.jobs.len();
        let coordinator = &self.coordinator;
        self.jobs = std::mem::take(&mut self.jobs)
            .into_iter()
            .map(|job| coordinator.reconcile(job))
            .filter(|job| !job.is_empty())
            .collect();

        if self.jobs.is_empty() {
            info!(repaired = before, "all repair jobs completed");
        } else {
            debug!(before, outstanding = self.jobs.len(), "reconciliation pass");
        }
        self.jobs.len() as u32
    }
}
