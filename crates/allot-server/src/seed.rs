//! Initial content of the in-memory store, read from a TOML file
//!
//! ```toml
//! [[users]]
//! id = "alice"
//! used-tokens = 2
//!
//! [[bookings]]
//! user = "alice"
//! ```

use std::path::Path;

use allot_core::Booking;
use allot_rocket::Database;
use eyre::{Result, WrapErr};
use serde::Deserialize;

#[derive(Clone, Deserialize, Default, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub bookings: Vec<SeedBooking>,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct SeedUser {
    pub id: String,
    #[serde(default)]
    pub used_tokens: u32,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct SeedBooking {
    pub user: String,
}

impl Seed {
    /// Read and parse the seed file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read seed file {}", path.display()))?;
        let seed = toml::from_str(&contents)
            .wrap_err_with(|| format!("invalid seed file {}", path.display()))?;
        Ok(seed)
    }

    /// Insert users and pending bookings into `database`, in file order
    pub fn apply(&self, database: &Database) {
        for user in &self.users {
            database.set_used_tokens(user.id.as_str(), user.used_tokens);
        }
        for booking in &self.bookings {
            database.insert_booking(Booking::pending(booking.user.as_str()));
        }
    }
}
