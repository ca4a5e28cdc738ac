use std::io::ErrorKind;

use allot_core::BookingPolicy;
use eyre::{eyre, Result};
use serde::Deserialize;

/// Defaults for test contexts, read from `allot.toml`
#[derive(Clone, Deserialize, Default, Debug)]
#[serde(rename_all = "kebab-case")]
pub struct TestSettings {
    #[serde(default)]
    pub spots: Option<u32>,

    #[serde(default)]
    pub policy: Option<String>,

    #[serde(default)]
    pub rng_seed: Option<u64>,

    #[serde(default)]
    pub balancer_threads: Option<u16>,
}

impl TestSettings {
    /// Load `allot.toml` from the current directory or one of its ancestors
    ///
    /// A missing file yields the defaults. `ALLOT_SPOTS`, `ALLOT_POLICY` and
    /// `ALLOT_SEED` override the file.
    pub fn load() -> Result<Self> {
        let mut path = std::env::current_dir()?;
        let mut settings = loop {
            path.push("allot.toml");

            match std::fs::read_to_string(&path) {
                Ok(s) => break toml::from_str::<TestSettings>(&s)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            path.pop();
            if !path.pop() {
                break TestSettings::default();
            }
        };

        if let Ok(v) = std::env::var("ALLOT_SPOTS") {
            settings.spots = Some(v.parse().map_err(|_| eyre!("ALLOT_SPOTS must be a u32"))?);
        }
        if let Ok(v) = std::env::var("ALLOT_POLICY") {
            settings.policy = Some(v);
        }
        if let Ok(v) = std::env::var("ALLOT_SEED") {
            settings.rng_seed = Some(v.parse().map_err(|_| eyre!("ALLOT_SEED must be a u64"))?);
        }

        Ok(settings)
    }

    /// The configured booking policy, if any
    pub fn policy(&self) -> Result<Option<BookingPolicy>> {
        self.policy
            .as_deref()
            .map(|p| p.parse().map_err(|e: String| eyre!(e)))
            .transpose()
    }
}
