use std::sync::Arc;

use allot_core::{BookingPolicy, Config, Store};
use allot_rocket::{Coordinator, Database};
use eyre::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use settings::TestSettings;

mod api;
mod faulty;
mod settings;
pub use api::{Allocated, Api, ApiError, ApiResponse};
pub use faulty::{Faults, FaultyStore};

pub struct TestCtxBuilder {
    /// Spots handed out per run
    pub spots: u32,
    /// Eligibility of users with several pending bookings
    pub policy: BookingPolicy,
    /// Seconds between two periodic reconciliation passes
    pub reconcile_interval: u32,
    /// Count of balancer threads
    pub balancer_threads: u16,
    /// Seed of the coordinator's random source, entropy if unset
    pub rng_seed: Option<u64>,
    /// Failures to inject into the store
    pub faults: Option<Faults>,
}

impl TestCtxBuilder {
    /// Create a new test context builder initialized with environment defaults
    pub fn from_env() -> Result<Self> {
        let settings = TestSettings::load()?;

        Ok(TestCtxBuilder {
            spots: settings.spots.unwrap_or(8),
            policy: settings.policy()?.unwrap_or_default(),
            // long enough that only explicit reconcile requests trigger a pass
            reconcile_interval: 600,
            balancer_threads: settings.balancer_threads.unwrap_or(2),
            rng_seed: settings.rng_seed,
            faults: None,
        })
    }

    /// Set the number of spots per run
    pub fn with_spots(mut self, spots: u32) -> Self {
        self.spots = spots;
        self
    }

    /// Set the booking policy
    pub fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the number of balancer threads to use
    pub fn with_balancer_threads(mut self, threads: u16) -> Self {
        assert_ne!(threads, 0);
        self.balancer_threads = threads;
        self
    }

    /// Set the interval of periodic reconciliation passes (in seconds)
    pub fn with_reconcile_interval(mut self, interval: u32) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Seed the coordinator's random source
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Run against a store failing as described by `faults`
    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Get the [`allot_core::Config`] for launching the allotment
    fn config(&self) -> Config {
        Config {
            spots: self.spots,
            policy: self.policy,
            reconcile_interval: self.reconcile_interval,
        }
    }

    /// Build the test context
    pub async fn build(self) -> Result<TestCtx> {
        let config = self.config();
        let database = Arc::new(Database::new());

        let (faulty, store): (Option<Arc<FaultyStore>>, Arc<dyn Store>) = match self.faults {
            Some(faults) => {
                let faulty = Arc::new(FaultyStore::new(database.clone(), faults));
                (Some(faulty.clone()), faulty as Arc<dyn Store>)
            }
            None => (None, database.clone() as Arc<dyn Store>),
        };

        let (repair_sender, repair_receiver) = crossbeam::channel::unbounded();
        let coordinator = match self.rng_seed {
            Some(seed) => Coordinator::with_rng(store, config.policy, StdRng::seed_from_u64(seed)),
            None => Coordinator::new(store, config.policy),
        }
        .with_repair_sender(repair_sender);

        let (balancer, api) = api::mock::start(
            self.balancer_threads,
            config,
            Arc::new(coordinator),
            repair_receiver,
        )
        .await;

        Ok(TestCtx {
            api,
            database,
            faulty,
            balancer,
            spots: self.spots,
            drop_bomb: DropBomb,
        })
    }
}

/// Test context
pub struct TestCtx {
    /// API allowing to interact with the allotment
    pub api: Api,
    /// The store behind the allotment, for seeding and inspection
    pub database: Arc<Database>,
    /// The fault-injecting wrapper, if faults were requested
    pub faulty: Option<Arc<FaultyStore>>,
    balancer: api::mock::MockBalancer,
    /// Spots per run
    pub spots: u32,

    drop_bomb: DropBomb,
}

impl TestCtx {
    /// Shut down the allotment and finish the test
    pub async fn finish(self) {
        std::mem::forget(self.drop_bomb);
        drop(self.api);
        self.balancer.shutdown().await;
    }
}

struct DropBomb;

impl Drop for DropBomb {
    fn drop(&mut self) {
        eprintln!("@TestAuthor: You should call `ctx.finish().await` to shut the allotment down");
    }
}
