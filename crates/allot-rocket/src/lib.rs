//! :rocket: Fair parking allotment.
//!
//! The components are the [selector], the [coordinator] executing allocation
//! runs, the [reconciler] completing partially applied runs, the in-memory
//! [database] and the [balancer] serving requests.

#![allow(rustdoc::private_intra_doc_links)]
use std::sync::Arc;
use std::thread;

use allot_core::{Config, Store};
use crossbeam::channel::{unbounded, Receiver};
use tracing::info;

mod balancer;
mod coordinator;
mod database;
mod error;
mod reconciler;
mod repair;
mod selector;

pub use balancer::{Balancer, ALLOCATED_MESSAGE, FAILED_MESSAGE};
pub use coordinator::Coordinator;
pub use database::Database;
pub use error::AllocationError;
pub use reconciler::{Reconciler, ReconcilerCommand};
pub use repair::{GrantRepair, MissingWrites, RepairJob};
pub use selector::select;

/// Entrypoint of the allotment
///
/// Constructs the coordinator for `store`, starts the reconciler thread and
/// returns the balancer serving requests.
pub fn launch(config: &Config, store: Arc<dyn Store>) -> Balancer {
    let (repair_sender, repair_receiver) = unbounded();
    let coordinator =
        Arc::new(Coordinator::new(store, config.policy).with_repair_sender(repair_sender));
    launch_with(config, coordinator, repair_receiver)
}

/// Like [`launch()`], but with a prepared coordinator
///
/// `repair_receiver` must receive the repair jobs of `coordinator`.
pub fn launch_with(
    config: &Config,
    coordinator: Arc<Coordinator>,
    repair_receiver: Receiver<RepairJob>,
) -> Balancer {
    let (command_sender, command_receiver) = unbounded();
    let mut reconciler = Reconciler::new(
        coordinator.clone(),
        config.reconcile_interval,
        repair_receiver,
        command_receiver,
    );
    let reconciler_thread = thread::spawn(move || {
        reconciler.run();
    });

    info!(
        spots = config.spots,
        policy = %config.policy,
        reconcile_interval = config.reconcile_interval,
        "allotment launched"
    );
    Balancer::new(coordinator, config.spots, command_sender, reconciler_thread)
}
