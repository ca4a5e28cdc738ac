use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use allot_core::{BookingPolicy, BookingStatus, Store, UserId};
use allot_rocket::{Coordinator, Database};
use allot_tests::TestCtxBuilder;
use eyre::Result;
use futures::future::join_all;

mod util;
use util::{assert_distinct, seed, user_names};

#[tokio::test]
#[ntest::timeout(30_000)]
async fn test_concurrent_requests_never_double_allocate() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_spots(8)
        .with_policy(BookingPolicy::OnePerUser)
        .with_balancer_threads(4)
        .build()
        .await?;
    let names = user_names(40);
    let users: Vec<(&str, u32)> = names.iter().map(|n| (n.as_str(), 0)).collect();
    seed(&ctx.database, &users);

    // spread the requests over all balancer threads
    let mut apis = Vec::new();
    let mut api = ctx.api.clone();
    for _ in 0..8 {
        let next = api.clone();
        apis.push(api);
        api = next;
    }
    drop(api);

    let responses = join_all(apis.into_iter().map(|api| async move { api.allocate().await })).await;

    let mut bookings = HashSet::new();
    for response in responses {
        let allocated = response?.result?;
        assert_distinct(&allocated.allocations);
        for allocation in allocated.allocations {
            assert!(
                bookings.insert(allocation.booking),
                "Booking {} was allocated by two runs.",
                allocation.booking
            );
        }
    }

    assert_eq!(bookings.len(), 40);
    assert_eq!(ctx.database.count_bookings(BookingStatus::Pending), 0);
    assert_eq!(ctx.database.allocations().len(), 40);
    for name in &names {
        assert_eq!(ctx.database.used_tokens(&UserId::from(name.as_str())), 1);
    }

    ctx.finish().await;
    Ok(())
}

#[test]
fn test_concurrent_runs_are_serialized() {
    let database = Arc::new(Database::new());
    let names = user_names(20);
    let users: Vec<(&str, u32)> = names.iter().map(|n| (n.as_str(), 0)).collect();
    seed(&database, &users);
    let coordinator = Coordinator::new(database.clone() as Arc<dyn Store>, BookingPolicy::OnePerUser);

    let runs: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| coordinator.run(5).unwrap().len()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // every run saw what the previous ones left
    let mut sizes = runs.clone();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![0, 0, 0, 0, 5, 5, 5, 5]);

    let records = database.allocations();
    let bookings: HashSet<_> = records.iter().map(|a| a.booking).collect();
    assert_eq!(records.len(), 20);
    assert_eq!(bookings.len(), 20);
}
