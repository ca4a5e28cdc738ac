use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use allot_core::{Allocation, Booking, BookingId, BookingStatus, UserId};
use allot_rocket::Database;

/// Pending booking of `user` created `secs` seconds after the epoch.
#[allow(unused)]
pub fn booking_at(user: &str, secs: u64) -> Booking {
    Booking {
        id: BookingId::new_v4(),
        user: UserId::from(user),
        created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        status: BookingStatus::Pending,
    }
}

/// Seeds one pending booking per `(user, used_tokens)` pair, in order.
///
/// Returns the booking ids in fetch order.
#[allow(unused)]
pub fn seed(database: &Database, users: &[(&str, u32)]) -> Vec<BookingId> {
    users
        .iter()
        .enumerate()
        .map(|(i, &(user, tokens))| {
            database.set_used_tokens(user, tokens);
            let booking = booking_at(user, i as u64);
            let id = booking.id;
            database.insert_booking(booking);
            id
        })
        .collect()
}

/// Names `user-0 .. user-{n-1}`.
#[allow(unused)]
pub fn user_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user-{i}")).collect()
}

/// Checks that spots and bookings of one run are pairwise distinct.
#[allow(unused)]
pub fn assert_distinct(allocations: &[Allocation]) {
    let spots: HashSet<_> = allocations.iter().map(|a| a.spot).collect();
    let bookings: HashSet<_> = allocations.iter().map(|a| a.booking).collect();
    assert_eq!(spots.len(), allocations.len(), "Spots must not be handed out twice.");
    assert_eq!(bookings.len(), allocations.len(), "Bookings must not be allocated twice.");
}
