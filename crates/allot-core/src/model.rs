use std::fmt;
use std::time::SystemTime;

use uuid::Uuid;

/// Identity of a booking
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BookingId(pub Uuid);

impl BookingId {
    /// Generate a fresh random booking id
    #[inline]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Identity of a user requesting spots
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct UserId(pub String);

impl UserId {
    /// Borrow the raw identifier
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a booking
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BookingStatus {
    /// Waiting for an allocation run
    Pending,
    /// A spot has been granted
    Allocated,
    /// Withdrawn by the booking subsystem; never produced here
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Allocated => "allocated",
            BookingStatus::Cancelled => "cancelled",
        })
    }
}

/// A request of one user for one spot
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Booking {
    /// The booking's id
    pub id: BookingId,
    /// The requesting user
    pub user: UserId,
    /// Creation time, determines the fetch order
    pub created_at: SystemTime,
    /// Current status
    pub status: BookingStatus,
}

impl Booking {
    /// Create a new pending booking for `user`
    pub fn pending(user: impl Into<UserId>) -> Self {
        Self {
            id: BookingId::new_v4(),
            user: user.into(),
            created_at: SystemTime::now(),
            status: BookingStatus::Pending,
        }
    }
}

/// Fairness record of a user
///
/// `used_tokens` counts the spots granted to the user so far. It only ever
/// grows; users without a record are treated as having zero tokens.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct UserRecord {
    /// The user
    pub user: UserId,
    /// Number of spots granted so far
    pub used_tokens: u32,
}

/// Positional spot number, starting at 1
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SpotId(pub u32);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spot {}", self.0)
    }
}

/// A spot granted to a user for one booking
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Allocation {
    /// The user receiving the spot
    pub user: UserId,
    /// The spot
    pub spot: SpotId,
    /// The booking the spot was granted for
    pub booking: BookingId,
}

/// An entry competing in the fairness selection
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Candidate<I> {
    /// Identity of the entry
    pub id: I,
    /// Fairness weight, lower is served first
    pub weight: u32,
}

impl<I> Candidate<I> {
    /// Create a new candidate
    #[inline]
    pub fn new(id: I, weight: u32) -> Self {
        Self { id, weight }
    }
}
