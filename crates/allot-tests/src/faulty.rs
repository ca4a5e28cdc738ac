//! Store wrapper injecting failures into selected operations

use std::collections::HashSet;
use std::sync::Arc;

use allot_core::{
    Allocation, AllocationFilter, Booking, BookingFilter, BookingId, BookingStatus, Store,
    StoreError, StoreResult, UserId, UserRecord, WriteSet,
};
use allot_rocket::Database;
use parking_lot::Mutex;

/// Which operations fail
#[derive(Clone, Default, Debug)]
pub struct Faults {
    /// Every read fails
    pub reads: bool,
    /// Every write fails, including commits
    pub writes: bool,
    /// Forward atomic commits to the database instead of writing one by one
    pub atomic_commit: bool,
    /// Status updates of these users' bookings fail
    pub status_users: HashSet<UserId>,
    /// Token increments of these users fail
    pub token_users: HashSet<UserId>,
    /// Allocation records of these users fail to insert
    pub record_users: HashSet<UserId>,
    /// Bookings of these users are cancelled right before a status update or
    /// commit touches them, as if withdrawn concurrently
    pub withdrawn_users: HashSet<UserId>,
}

impl Faults {
    /// Fail token increments of `users`
    pub fn failing_tokens<'a>(users: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            token_users: users.into_iter().map(UserId::from).collect(),
            ..Self::default()
        }
    }

    /// Fail status updates of the bookings of `users`
    pub fn failing_status<'a>(users: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            status_users: users.into_iter().map(UserId::from).collect(),
            ..Self::default()
        }
    }

    /// Fail allocation record inserts of `users`
    pub fn failing_records<'a>(users: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            record_users: users.into_iter().map(UserId::from).collect(),
            ..Self::default()
        }
    }

    /// Withdraw the bookings of `users` while a run is writing
    pub fn withdrawing<'a>(users: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            withdrawn_users: users.into_iter().map(UserId::from).collect(),
            ..Self::default()
        }
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

/// A [`Store`] over a [`Database`] failing as described by its [`Faults`]
pub struct FaultyStore {
    database: Arc<Database>,
    faults: Mutex<Faults>,
}

impl FaultyStore {
    pub fn new(database: Arc<Database>, faults: Faults) -> Self {
        Self {
            database,
            faults: Mutex::new(faults),
        }
    }

    /// Replace the active faults
    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock() = faults;
    }

    /// Stop failing
    pub fn heal(&self) {
        self.set_faults(Faults::default());
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.faults.lock().reads {
            return Err(injected("read"));
        }
        Ok(())
    }

    fn withdraw(&self, booking: &BookingId) {
        let Some(b) = self.database.booking(booking) else {
            return;
        };
        if self.faults.lock().withdrawn_users.contains(&b.user) {
            let _ = self.database.update_booking_status(
                booking,
                BookingStatus::Pending,
                BookingStatus::Cancelled,
            );
        }
    }

    fn check_write(&self, users: &HashSet<UserId>, user: &UserId, what: &str) -> StoreResult<()> {
        if self.faults.lock().writes || users.contains(user) {
            return Err(injected(what));
        }
        Ok(())
    }
}

impl Store for FaultyStore {
    fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        self.check_read()?;
        self.database.find_bookings(filter)
    }

    fn find_users(&self, users: &[UserId]) -> StoreResult<Vec<UserRecord>> {
        self.check_read()?;
        self.database.find_users(users)
    }

    fn find_allocations(&self, filter: &AllocationFilter) -> StoreResult<Vec<Allocation>> {
        self.check_read()?;
        self.database.find_allocations(filter)
    }

    fn update_booking_status(
        &self,
        booking: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<()> {
        self.withdraw(booking);
        if let Some(b) = self.database.booking(booking) {
            let users = self.faults.lock().status_users.clone();
            self.check_write(&users, &b.user, "status")?;
        }
        self.database.update_booking_status(booking, from, to)
    }

    fn increment_tokens(&self, users: &[UserId]) -> StoreResult<()> {
        let failing = self.faults.lock().token_users.clone();
        for user in users {
            self.check_write(&failing, user, "token")?;
        }
        self.database.increment_tokens(users)
    }

    fn insert_allocations(&self, allocations: &[Allocation]) -> StoreResult<()> {
        let failing = self.faults.lock().record_users.clone();
        for allocation in allocations {
            self.check_write(&failing, &allocation.user, "record")?;
        }
        self.database.insert_allocations(allocations)
    }

    fn supports_atomic_commit(&self) -> bool {
        self.faults.lock().atomic_commit
    }

    fn commit(&self, writes: &WriteSet) -> StoreResult<()> {
        if self.faults.lock().writes {
            return Err(injected("commit"));
        }
        for booking in &writes.bookings {
            self.withdraw(booking);
        }
        self.database.commit(writes)
    }
}
