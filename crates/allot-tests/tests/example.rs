use allot_core::{BookingPolicy, BookingStatus, UserId};
use allot_rocket::ALLOCATED_MESSAGE;
use allot_tests::TestCtxBuilder;
use eyre::Result;

mod util;
use util::{assert_distinct, seed, user_names};

#[tokio::test] // Every test function needs to be decorated with this attribute
#[ntest::timeout(20_000)] // Test timeout in ms
async fn test_example() -> Result<()> {
    // Create a test context handing out 8 spots per run
    let ctx = TestCtxBuilder::from_env()?
        .with_spots(8)
        .with_policy(BookingPolicy::OnePerUser)
        .build()
        .await?;

    let ids = seed(
        &ctx.database,
        &[("ann", 0), ("ben", 0), ("cat", 0), ("dan", 0), ("eve", 0)],
    );

    // Everybody gets a spot, in booking order
    let allocated = ctx.api.allocate().await?.result?;
    assert_eq!(allocated.message, ALLOCATED_MESSAGE);
    assert_eq!(allocated.allocations.len(), 5);
    for (i, allocation) in allocated.allocations.iter().enumerate() {
        assert_eq!(allocation.booking, ids[i]);
        assert_eq!(allocation.spot.to_string(), format!("Spot {}", i + 1));
    }

    // Nothing is pending anymore
    let allocated = ctx.api.allocate().await?.result?;
    assert_eq!(allocated.message, ALLOCATED_MESSAGE);
    assert!(allocated.allocations.is_empty());

    // Finish the test
    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_ten_users_eight_spots() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_spots(8)
        .with_policy(BookingPolicy::OnePerUser)
        .build()
        .await?;
    let names = user_names(10);
    let users: Vec<(&str, u32)> = names.iter().map(|n| (n.as_str(), 0)).collect();
    seed(&ctx.database, &users);

    let allocated = ctx.api.allocate().await?.result?;
    assert_eq!(allocated.allocations.len(), 8);
    assert_distinct(&allocated.allocations);
    assert_eq!(ctx.database.count_bookings(BookingStatus::Pending), 2);

    let tokens: u32 = names
        .iter()
        .map(|n| ctx.database.used_tokens(&UserId::from(n.as_str())))
        .sum();
    assert_eq!(tokens, 8);
    for allocation in &allocated.allocations {
        assert_eq!(ctx.database.used_tokens(&allocation.user), 1);
    }

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_capacity_override() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?.with_spots(8).build().await?;
    seed(&ctx.database, &[("ann", 0), ("ben", 0), ("cat", 0)]);

    let allocated = ctx.api.allocate_with_capacity(0).await?.result?;
    assert!(allocated.allocations.is_empty());
    assert_eq!(ctx.database.count_bookings(BookingStatus::Pending), 3);

    let allocated = ctx.api.allocate_with_capacity(2).await?.result?;
    assert_eq!(allocated.allocations.len(), 2);
    assert_eq!(ctx.database.count_bookings(BookingStatus::Pending), 1);

    ctx.finish().await;
    Ok(())
}

#[tokio::test]
#[ntest::timeout(20_000)]
async fn test_debug() -> Result<()> {
    let ctx = TestCtxBuilder::from_env()?
        .with_spots(3)
        .with_policy(BookingPolicy::PerBooking)
        .build()
        .await?;

    let response = ctx.api.debug().await?;
    assert!(!response.request_id.is_nil());
    assert_eq!(response.result?, "3 spots per run, policy per-booking");

    ctx.finish().await;
    Ok(())
}
