//! Implementation of the in-memory store

use std::collections::HashMap;

use allot_core::{
    Allocation, AllocationFilter, Booking, BookingFilter, BookingId, BookingStatus, Store,
    StoreError, StoreResult, UserId, UserRecord, WriteSet,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Tables {
    /// Bookings in insertion order
    bookings: Vec<Booking>,
    /// Position of each booking in `bookings`
    booking_index: HashMap<BookingId, usize>,
    /// Token counters per user
    users: HashMap<UserId, u32>,
    /// Allocation records, append only
    allocations: Vec<Allocation>,
}

impl Tables {
    fn booking_mut(&mut self, id: &BookingId) -> Option<&mut Booking> {
        let index = *self.booking_index.get(id)?;
        self.bookings.get_mut(index)
    }

    fn check_status(&self, id: &BookingId, expected: BookingStatus) -> StoreResult<()> {
        match self.booking_index.get(id).map(|&i| &self.bookings[i]) {
            Some(booking) if booking.status == expected => Ok(()),
            _ => Err(StoreError::Conflict {
                booking: *id,
                expected,
            }),
        }
    }

    fn increment(&mut self, users: &[UserId]) {
        for user in users {
            let tokens = self.users.entry(user.clone()).or_insert(0);
            *tokens = tokens.saturating_add(1);
        }
    }
}

/// In-memory store holding bookings, user fairness records and allocation
/// records
///
/// All tables live behind one lock, so [`Store::commit()`] is atomic.
#[derive(Default)]
pub struct Database {
    tables: Mutex<Tables>,
}

impl Database {
    /// Create a new, empty [`Database`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a booking.
    pub fn insert_booking(&self, booking: Booking) {
        let mut tables = self.tables.lock();
        let index = tables.bookings.len();
        tables.booking_index.insert(booking.id, index);
        tables.bookings.push(booking);
    }

    /// Create or overwrite the fairness record of a user.
    pub fn set_used_tokens(&self, user: impl Into<UserId>, used_tokens: u32) {
        self.tables.lock().users.insert(user.into(), used_tokens);
    }

    /// Get the number of tokens used by `user`, zero if there is no record.
    pub fn used_tokens(&self, user: &UserId) -> u32 {
        self.tables.lock().users.get(user).copied().unwrap_or(0)
    }

    /// Get a booking by id.
    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        let tables = self.tables.lock();
        tables.booking_index.get(id).map(|&i| tables.bookings[i].clone())
    }

    /// Get the number of bookings in status `status`.
    pub fn count_bookings(&self, status: BookingStatus) -> usize {
        self.tables
            .lock()
            .bookings
            .iter()
            .filter(|b| b.status == status)
            .count()
    }

    /// Get all allocation records.
    pub fn allocations(&self) -> Vec<Allocation> {
        self.tables.lock().allocations.clone()
    }
}

impl Store for Database {
    fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.lock();
        let mut bookings: Vec<Booking> = tables
            .bookings
            .iter()
            .filter(|b| filter.status.map_or(true, |status| b.status == status))
            .cloned()
            .collect();
        // stable, so insertion order breaks ties
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    fn find_users(&self, users: &[UserId]) -> StoreResult<Vec<UserRecord>> {
        let tables = self.tables.lock();
        Ok(users
            .iter()
            .filter_map(|user| {
                tables.users.get(user).map(|&used_tokens| UserRecord {
                    user: user.clone(),
                    used_tokens,
                })
            })
            .collect())
    }

    fn find_allocations(&self, filter: &AllocationFilter) -> StoreResult<Vec<Allocation>> {
        let tables = self.tables.lock();
        Ok(tables
            .allocations
            .iter()
            .filter(|a| filter.user.as_ref().map_or(true, |user| &a.user == user))
            .filter(|a| filter.booking.map_or(true, |booking| a.booking == booking))
            .cloned()
            .collect())
    }

    fn update_booking_status(
        &self,
        booking: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        tables.check_status(booking, from)?;
        if let Some(booking) = tables.booking_mut(booking) {
            booking.status = to;
        }
        Ok(())
    }

    fn increment_tokens(&self, users: &[UserId]) -> StoreResult<()> {
        self.tables.lock().increment(users);
        Ok(())
    }

    fn insert_allocations(&self, allocations: &[Allocation]) -> StoreResult<()> {
        self.tables
            .lock()
            .allocations
            .extend_from_slice(allocations);
        Ok(())
    }

    fn supports_atomic_commit(&self) -> bool {
        true
    }

    fn commit(&self, writes: &WriteSet) -> StoreResult<()> {
        let mut tables = self.tables.lock();

        // Validate everything before touching anything
        for booking in &writes.bookings {
            tables.check_status(booking, BookingStatus::Pending)?;
        }

        for booking in &writes.bookings {
            if let Some(booking) = tables.booking_mut(booking) {
                booking.status = BookingStatus::Allocated;
            }
        }
        tables.increment(&writes.increments);
        tables
            .allocations
            .extend_from_slice(&writes.allocations);
        Ok(())
    }
}
