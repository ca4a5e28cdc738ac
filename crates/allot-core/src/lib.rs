//! 🏗 Infrastructure for the parking allotment: domain types, the store
//! abstraction and request handling.
#![warn(missing_docs)]

mod model;
mod request;
mod store;

use std::fmt;
use std::str::FromStr;

pub use model::{Allocation, Booking, BookingId, BookingStatus, Candidate, SpotId, UserId, UserRecord};
pub use request::{RawRequest, Request, RequestHandler, RequestKind, RequestMethod};
pub use store::{
    AllocationFilter, BookingFilter, Store, StoreError, StoreResult, WriteSet,
};

/// Configuration of the parking allotment
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of spots handed out by a single allocation run
    pub spots: u32,
    /// How users with several pending bookings are treated
    pub policy: BookingPolicy,
    /// Interval in seconds between two reconciliation passes
    pub reconcile_interval: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spots: 8,
            policy: BookingPolicy::default(),
            reconcile_interval: 10,
        }
    }
}

/// Eligibility of users that have more than one pending booking
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum BookingPolicy {
    /// A user competes once per run, with their earliest pending booking
    #[default]
    OnePerUser,
    /// Every pending booking competes on its own, sharing the user's weight
    PerBooking,
}

impl fmt::Display for BookingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingPolicy::OnePerUser => f.write_str("one-per-user"),
            BookingPolicy::PerBooking => f.write_str("per-booking"),
        }
    }
}

impl FromStr for BookingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one-per-user" | "per-user" => Ok(BookingPolicy::OnePerUser),
            "per-booking" => Ok(BookingPolicy::PerBooking),
            other => Err(format!("unknown booking policy `{other}`")),
        }
    }
}
