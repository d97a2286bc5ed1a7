//! Environment configuration.
//!
//! Only two variables are recognized: `DEV` selects the fixture file instead
//! of the live `rocm-smi` command, and `PORT` overrides the listen port.
//! Names are matched exactly; an empty value means "unset".

use std::collections::HashMap;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::Result;

/// Environment variables read by [`Settings::load`].
pub const RECOGNIZED_VARS: &[&str] = &["DEV", "PORT"];

/// Default metrics port.
pub const DEFAULT_PORT: u16 = 9101;

/// Runtime settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Read snapshots from the development fixture.
    #[serde(alias = "DEV")]
    pub dev: bool,
    /// Port the metrics endpoint listens on.
    #[serde(alias = "PORT")]
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dev: false,
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, value)| {
                RECOGNIZED_VARS.contains(&key.as_str()) && !value.trim().is_empty()
            })
            .collect();

        let env = Environment::default()
            .source(Some(vars))
            .ignore_empty(true)
            .try_parsing(true);
        let settings = Config::builder().add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Address the metrics endpoint binds to.
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
