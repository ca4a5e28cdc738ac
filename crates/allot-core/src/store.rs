//! Abstract persistent store the allotment runs against

use thiserror::Error;

use crate::model::{Allocation, Booking, BookingId, BookingStatus, UserId, UserRecord};

/// Errors reported by a [`Store`]
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A conditional update did not match, e.g., the booking is no longer in
    /// the expected status
    #[error("booking {booking} is not {expected}")]
    Conflict {
        /// The booking that did not match
        booking: BookingId,
        /// The status the update expected
        expected: BookingStatus,
    },

    /// The store does not implement the operation
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Result type of [`Store`] operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for [`Store::find_bookings()`]
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BookingFilter {
    /// Only return bookings with this status
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    /// Filter matching pending bookings only
    pub const PENDING: BookingFilter = BookingFilter {
        status: Some(BookingStatus::Pending),
    };
}

/// Filter for [`Store::find_allocations()`]
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct AllocationFilter {
    /// Only return allocations granted to this user
    pub user: Option<UserId>,
    /// Only return allocations created for this booking
    pub booking: Option<BookingId>,
}

/// All writes produced by one allocation run
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct WriteSet {
    /// Bookings transitioning from pending to allocated
    pub bookings: Vec<BookingId>,
    /// Users whose token counter is incremented, once per entry
    pub increments: Vec<UserId>,
    /// Allocation records to insert
    pub allocations: Vec<Allocation>,
}

impl WriteSet {
    /// Build the write set for a list of granted allocations
    pub fn for_allocations(allocations: &[Allocation]) -> Self {
        Self {
            bookings: allocations.iter().map(|a| a.booking).collect(),
            increments: allocations.iter().map(|a| a.user.clone()).collect(),
            allocations: allocations.to_vec(),
        }
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty() && self.increments.is_empty() && self.allocations.is_empty()
    }
}

/// Interface of the persistent store holding bookings, user fairness records
/// and allocation records
///
/// Implementations must be safe to share between threads. None of the methods
/// are retried by the caller.
pub trait Store: Send + Sync {
    /// Return the bookings matching `filter`, ordered by creation time
    fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;

    /// Return the fairness records of the given users
    ///
    /// Users without a record are simply absent from the result.
    fn find_users(&self, users: &[UserId]) -> StoreResult<Vec<UserRecord>>;

    /// Return the allocation records matching `filter`
    fn find_allocations(&self, filter: &AllocationFilter) -> StoreResult<Vec<Allocation>>;

    /// Set the status of `booking` to `to`, provided it is currently `from`
    ///
    /// Fails with [`StoreError::Conflict`] if the booking is not in status
    /// `from`.
    fn update_booking_status(
        &self,
        booking: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<()>;

    /// Increment `used_tokens` by one for every entry of `users`
    ///
    /// Missing records are created. A user listed twice is incremented twice.
    fn increment_tokens(&self, users: &[UserId]) -> StoreResult<()>;

    /// Append allocation records
    fn insert_allocations(&self, allocations: &[Allocation]) -> StoreResult<()>;

    /// Whether [`Store::commit()`] applies a [`WriteSet`] atomically
    fn supports_atomic_commit(&self) -> bool {
        false
    }

    /// Apply all writes of `writes` or none of them
    ///
    /// Every booking of the write set must be pending, otherwise the commit
    /// fails with [`StoreError::Conflict`] without applying anything.
    fn commit(&self, writes: &WriteSet) -> StoreResult<()> {
        let _ = writes;
        Err(StoreError::Unsupported("atomic commit"))
    }
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn find_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        (**self).find_bookings(filter)
    }

    fn find_users(&self, users: &[UserId]) -> StoreResult<Vec<UserRecord>> {
        (**self).find_users(users)
    }

    fn find_allocations(&self, filter: &AllocationFilter) -> StoreResult<Vec<Allocation>> {
        (**self).find_allocations(filter)
    }

    fn update_booking_status(
        &self,
        booking: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
    ) -> StoreResult<()> {
        (**self).update_booking_status(booking, from, to)
    }

    fn increment_tokens(&self, users: &[UserId]) -> StoreResult<()> {
        (**self).increment_tokens(users)
    }

    fn insert_allocations(&self, allocations: &[Allocation]) -> StoreResult<()> {
        (**self).insert_allocations(allocations)
    }

    fn supports_atomic_commit(&self) -> bool {
        (**self).supports_atomic_commit()
    }

    fn commit(&self, writes: &WriteSet) -> StoreResult<()> {
        (**self).commit(writes)
    }
}
