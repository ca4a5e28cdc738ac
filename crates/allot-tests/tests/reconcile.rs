use std::time::Duration;

use allot_core::{BookingStatus, UserId};
use allot_rocket::FAILED_MESSAGE;
use allot_tests::{Faults, TestCtxBuilder};
use eyre::Result;

mod util;
use util::seed;

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_partial_write_is_reconciled_on_request() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_faults(Faults::failing_tokens(["bob"]))
        .build()
        .await?;
    seed(&ctx.database, &[("ann", 0), ("bob", 0)]);
    let bob = UserId::from("bob");

    let response = ctx.api.allocate().await?;
    match response.result {
        Ok(_) => panic!("A failed increment must fail the request."),
        Err(err) => assert_eq!(err.0, FAILED_MESSAGE),
    }
    assert_eq!(ctx.database.count_bookings(BookingStatus::Allocated), 2);
    assert_eq!(ctx.database.used_tokens(&bob), 0);

    // the store still fails
    assert_eq!(ctx.api.reconcile().await?.result?, 1);
    assert_eq!(ctx.database.used_tokens(&bob), 0);

    ctx.faulty.as_ref().unwrap().heal();
    assert_eq!(ctx.api.reconcile().await?.result?, 0);
    assert_eq!(ctx.database.used_tokens(&bob), 1);
    assert_eq!(ctx.database.allocations().len(), 2);

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_partial_write_is_reconciled_periodically() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_faults(Faults::failing_tokens(["bob"]))
        .with_reconcile_interval(1)
        .build()
        .await?;
    seed(&ctx.database, &[("ann", 0), ("bob", 0)]);
    let bob = UserId::from("bob");

    assert!(ctx.api.allocate().await?.result.is_err());
    ctx.faulty.as_ref().unwrap().heal();

    let mut tokens = 0;
    for _ in 0..50 {
        tokens = ctx.database.used_tokens(&bob);
        if tokens == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(tokens, 1, "The reconciler must complete the increment on its own.");
    assert_eq!(ctx.api.reconcile().await?.result?, 0);

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_unavailable_store_fails_request() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_faults(Faults {
            reads: true,
            ..Faults::default()
        })
        .build()
        .await?;
    seed(&ctx.database, &[("ann", 0)]);

    let err = ctx.api.allocate().await?.result.unwrap_err();
    assert_eq!(err.0, FAILED_MESSAGE);
    assert_eq!(ctx.database.count_bookings(BookingStatus::Pending), 1);
    // nothing to repair
    assert_eq!(ctx.api.reconcile().await?.result?, 0);

    ctx.finish().await;
    Ok(())
}
