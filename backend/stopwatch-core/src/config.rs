// src/config.rs
use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, TrackerError};
use crate::ticker::{TickPeriod, DEFAULT_TICK_MS};

pub const ENV_PREFIX: &str = "STOPWATCH_";

// Frames slower than this are visibly uneven on a seconds display.
const SMOOTH_TICK_MS: u64 = 100;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    // Server Configuration
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,

    // Stopwatch
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    // Logging fallback when RUST_LOG is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            environment: default_environment(),
            tick_interval_ms: default_tick_interval_ms(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Reads `STOPWATCH_*` variables (and `.env`). Values are not checked
    /// here; call [`Config::validate`] once command-line overrides are applied.
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Ok(envy::prefixed(ENV_PREFIX).from_env::<Config>()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Config>(vars)?)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.server_host.trim().is_empty() {
            return Err(AppError::InvalidConfig(
                "server_host must not be empty".to_string(),
            ));
        }
        self.tick_period()?;
        if self.tick_interval_ms > SMOOTH_TICK_MS {
            warn!(
                "Tick interval of {} ms is above {} ms; the display may step unevenly",
                self.tick_interval_ms, SMOOTH_TICK_MS
            );
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Result<TickPeriod, TrackerError> {
        TickPeriod::from_millis(self.tick_interval_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
